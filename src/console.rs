use crate::error::{Result, TesiraError};
use crate::tree::Interface;
use std::str::FromStr;

/// Diagnostic console command, applied to a resolved [`Interface`]
///
/// ```
/// use biamp_tesira::ConsoleCommand;
///
/// let command: ConsoleCommand = "SetGain -6.5".parse().unwrap();
/// assert_eq!(command, ConsoleCommand::SetGain(-6.5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    SetGain(f64),
    IncrementGain(f64),
    DecrementGain(f64),
    SetMute(bool),
    ToggleMute,
    Dial(String),
    Answer,
    End,
    Redial,
    Hold,
    Resume,
    Dtmf(char),
}

impl ConsoleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::SetGain(_) => "SetGain",
            ConsoleCommand::IncrementGain(_) => "IncrementGain",
            ConsoleCommand::DecrementGain(_) => "DecrementGain",
            ConsoleCommand::SetMute(_) => "SetMute",
            ConsoleCommand::ToggleMute => "ToggleMute",
            ConsoleCommand::Dial(_) => "Dial",
            ConsoleCommand::Answer => "Answer",
            ConsoleCommand::End => "End",
            ConsoleCommand::Redial => "Redial",
            ConsoleCommand::Hold => "Hold",
            ConsoleCommand::Resume => "Resume",
            ConsoleCommand::Dtmf(_) => "Dtmf",
        }
    }

    /// Run the command through the interface's typed setters
    pub fn apply(&self, interface: &Interface) -> Result<()> {
        match (self, interface) {
            (ConsoleCommand::SetGain(db), Interface::AecInputChannel(channel)) => {
                channel.set_gain(*db)
            }
            (ConsoleCommand::SetGain(db), Interface::LevelChannel(channel)) => {
                channel.set_level(*db)
            }
            (ConsoleCommand::SetGain(db), Interface::MixerInput(channel)) => channel.set_level(*db),
            (ConsoleCommand::SetGain(db), Interface::MixerOutput(channel)) => {
                channel.set_level(*db)
            }
            (ConsoleCommand::SetGain(db), Interface::Crosspoint(crosspoint)) => {
                crosspoint.set_level(*db)
            }

            (ConsoleCommand::IncrementGain(step), Interface::AecInputChannel(channel)) => {
                channel.increment_gain(*step)
            }
            (ConsoleCommand::IncrementGain(step), Interface::LevelChannel(channel)) => {
                channel.increment_level(*step)
            }
            (ConsoleCommand::IncrementGain(step), Interface::MixerInput(channel)) => {
                channel.increment_level(*step)
            }
            (ConsoleCommand::IncrementGain(step), Interface::MixerOutput(channel)) => {
                channel.increment_level(*step)
            }

            (ConsoleCommand::DecrementGain(step), Interface::AecInputChannel(channel)) => {
                channel.decrement_gain(*step)
            }
            (ConsoleCommand::DecrementGain(step), Interface::LevelChannel(channel)) => {
                channel.decrement_level(*step)
            }
            (ConsoleCommand::DecrementGain(step), Interface::MixerInput(channel)) => {
                channel.decrement_level(*step)
            }
            (ConsoleCommand::DecrementGain(step), Interface::MixerOutput(channel)) => {
                channel.decrement_level(*step)
            }

            (ConsoleCommand::SetMute(mute), Interface::AecInputChannel(channel)) => {
                channel.set_mute(*mute)
            }
            (ConsoleCommand::SetMute(mute), Interface::LevelChannel(channel)) => {
                channel.set_mute(*mute)
            }
            (ConsoleCommand::SetMute(mute), Interface::MixerInput(channel)) => {
                channel.set_mute(*mute)
            }
            (ConsoleCommand::SetMute(mute), Interface::MixerOutput(channel)) => {
                channel.set_mute(*mute)
            }

            (ConsoleCommand::ToggleMute, Interface::AecInputChannel(channel)) => {
                channel.toggle_mute()
            }
            (ConsoleCommand::ToggleMute, Interface::LevelChannel(channel)) => channel.toggle_mute(),
            (ConsoleCommand::ToggleMute, Interface::MixerInput(channel)) => channel.toggle_mute(),
            (ConsoleCommand::ToggleMute, Interface::MixerOutput(channel)) => channel.toggle_mute(),

            (ConsoleCommand::Dial(number), Interface::CallAppearance(call)) => call.dial(number),
            (ConsoleCommand::Answer, Interface::CallAppearance(call)) => call.answer(),
            (ConsoleCommand::End, Interface::CallAppearance(call)) => call.end(),
            (ConsoleCommand::Redial, Interface::CallAppearance(call)) => call.redial(),
            (ConsoleCommand::Hold, Interface::CallAppearance(call)) => call.hold(),
            (ConsoleCommand::Resume, Interface::CallAppearance(call)) => call.resume(),
            (ConsoleCommand::Dtmf(digit), Interface::CallAppearance(call)) => call.dtmf(*digit),

            _ => Err(TesiraError::UnsupportedCommand {
                command: self.name(),
                target: interface.type_name(),
            }),
        }
    }
}

impl FromStr for ConsoleCommand {
    type Err = TesiraError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, argument) = line
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((line, ""));

        let command = match name.to_ascii_lowercase().as_str() {
            "setgain" => ConsoleCommand::SetGain(parse_db(argument)?),
            "incrementgain" => ConsoleCommand::IncrementGain(parse_db(argument)?),
            "decrementgain" => ConsoleCommand::DecrementGain(parse_db(argument)?),
            "setmute" => ConsoleCommand::SetMute(parse_switch(argument)?),
            "togglemute" => ConsoleCommand::ToggleMute,
            "dial" if !argument.is_empty() => ConsoleCommand::Dial(argument.to_string()),
            "answer" => ConsoleCommand::Answer,
            "end" => ConsoleCommand::End,
            "redial" => ConsoleCommand::Redial,
            "hold" => ConsoleCommand::Hold,
            "resume" => ConsoleCommand::Resume,
            "dtmf" => {
                let mut chars = argument.chars();
                match (chars.next(), chars.next()) {
                    (Some(digit), None) => ConsoleCommand::Dtmf(digit),
                    _ => return Err(invalid(line)),
                }
            }
            _ => return Err(invalid(line)),
        };
        Ok(command)
    }
}

fn invalid(line: &str) -> TesiraError {
    TesiraError::InvalidCommand(line.to_string())
}

fn parse_db(argument: &str) -> Result<f64> {
    argument
        .parse::<f64>()
        .ok()
        .filter(|db| db.is_finite())
        .ok_or_else(|| TesiraError::InvalidCommand(format!("Invalid dB value '{}'", argument)))
}

fn parse_switch(argument: &str) -> Result<bool> {
    match argument.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(TesiraError::InvalidCommand(format!(
            "Expected on/off, got '{}'",
            argument
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::CommandSender;
    use crate::tree::AttributeInterfaceTree;
    use crate::types::{BlockKind, ChannelType};

    #[test]
    fn parses_commands() {
        assert_eq!(
            "setmute ON".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::SetMute(true)
        );
        assert_eq!(
            "  Dial 555 1234 ".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Dial("555 1234".to_string())
        );
        assert_eq!(
            "Dtmf #".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Dtmf('#')
        );
        assert_eq!(
            "ToggleMute".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::ToggleMute
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for line in ["", "SetGain", "SetGain loud", "SetMute maybe", "Dial", "Dtmf 12", "Reboot"] {
            assert!(
                matches!(
                    line.parse::<ConsoleCommand>(),
                    Err(TesiraError::InvalidCommand(_))
                ),
                "{:?} should not parse",
                line
            );
        }
    }

    #[test]
    fn applies_through_typed_setters() {
        let (sender, mut rx) = CommandSender::channel();
        let tree = AttributeInterfaceTree::new("dsp", sender);
        tree.add_block(BlockKind::Level, "Level1").unwrap();
        tree.add_block(BlockKind::Voip, "VoIP1").unwrap();
        tree.on_device_connected();

        let level = tree
            .get_interface("Level1", ChannelType::Input, &[2])
            .unwrap();
        while rx.try_recv().is_ok() {}

        ConsoleCommand::SetGain(-10.0).apply(&level).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "Level1 set level -10 2");

        let line = tree.get_interface("VoIP1", ChannelType::Line, &[1]).unwrap();
        assert!(matches!(
            ConsoleCommand::Dial("100".to_string()).apply(&line),
            Err(TesiraError::UnsupportedCommand {
                command: "Dial",
                target: "VoIP line"
            })
        ));
    }
}
