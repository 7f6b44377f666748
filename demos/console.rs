//! Interactive console against a hand-driven device
//!
//! Outbound command lines are printed as they would go on the wire. Input:
//!
//! ```text
//! connect | disconnect
//! < {"instanceTag":"AEC1","attribute":"numChannels","value":2}
//! AEC1 input 1 SetGain -6
//! VoIP1 ca 1 1 Dial 5551234
//! ```

use biamp_tesira::{
    AttributeInterfaceTree, ChannelType, CommandSender, ConsoleCommand, Connection, DeviceConfig,
    Response, TransportEvent,
};
use futures_util::{sink, stream};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const CONFIG: &str = r#"{
    "key": "demo-dsp",
    "blocks": [
        { "kind": "aecInput", "instanceTag": "AEC1" },
        { "kind": "level", "instanceTag": "Level1" },
        { "kind": "mixer", "instanceTag": "Mixer1" },
        { "kind": "voip", "instanceTag": "VoIP1" }
    ]
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = DeviceConfig::from_json(CONFIG)?;
    let (sender, outbound) = CommandSender::channel();
    let tree = Arc::new(AttributeInterfaceTree::from_config(&config, sender)?);

    let wire = Box::pin(sink::unfold((), |_, line: String| async move {
        println!(">> {}", line);
        Ok::<_, std::io::Error>(())
    }));
    let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();
    let events = Box::pin(stream::unfold(event_rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    }));
    let _connection = Connection::spawn(
        tree.clone(),
        outbound,
        wire,
        events,
        config.request_timeout(),
    );

    let mut changes = tree.subscribe_changes();
    tokio::spawn(async move {
        while let Ok(change) = changes.recv().await {
            println!(
                "** {}{} {} = {:?}",
                change.instance_tag, change.index_path, change.property, change.value
            );
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let result = match line {
            "" => continue,
            "quit" | "exit" => break,
            "connect" => event_tx
                .send(TransportEvent::Connected)
                .map_err(|e| e.to_string()),
            "disconnect" => event_tx
                .send(TransportEvent::Disconnected)
                .map_err(|e| e.to_string()),
            _ => match line.strip_prefix('<') {
                Some(json) => Response::from_json(json.trim())
                    .map_err(|e| e.to_string())
                    .and_then(|response| {
                        event_tx
                            .send(TransportEvent::Response(response))
                            .map_err(|e| e.to_string())
                    }),
                None => run_command(&tree, line),
            },
        };
        if let Err(e) = result {
            eprintln!("error: {}", e);
        }
    }

    tree.dispose();
    Ok(())
}

/// `<tag> <channel type> [indices...] <command> [argument]`
fn run_command(tree: &AttributeInterfaceTree, line: &str) -> Result<(), String> {
    let mut words = line.split_whitespace();
    let tag = words.next().ok_or("missing instance tag")?;
    let channel_type = match words.next().map(str::to_ascii_lowercase).as_deref() {
        Some("none") | Some("block") => ChannelType::None,
        Some("input") => ChannelType::Input,
        Some("output") => ChannelType::Output,
        Some("crosspoint") => ChannelType::Crosspoint,
        Some("line") => ChannelType::Line,
        Some("ca") => ChannelType::CallAppearance,
        other => return Err(format!("unknown channel type {:?}", other)),
    };

    let mut path = Vec::with_capacity(channel_type.arity());
    for _ in 0..channel_type.arity() {
        let index = words.next().ok_or("missing index")?;
        path.push(index.parse::<u32>().map_err(|e| e.to_string())?);
    }

    let command: ConsoleCommand = words
        .collect::<Vec<_>>()
        .join(" ")
        .parse()
        .map_err(|e: biamp_tesira::TesiraError| e.to_string())?;
    let interface = tree
        .get_interface(tag, channel_type, &path)
        .map_err(|e| e.to_string())?;
    command.apply(&interface).map_err(|e| e.to_string())
}
