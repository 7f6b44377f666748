use biamp_tesira::{
    AttributeInterfaceTree, BlockKind, CallState, ChannelType, CommandSender, ControlValue,
    DeviceConfig, DispatchOutcome, IndexPath, Interface, Response, RouteKey,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

fn tree() -> (AttributeInterfaceTree, mpsc::UnboundedReceiver<String>) {
    let (sender, rx) = CommandSender::channel();
    (AttributeInterfaceTree::new("dsp-1", sender), rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}

fn key(tag: &str, attribute: &str, path: &[u32]) -> RouteKey {
    RouteKey::new(tag, attribute, IndexPath::from(path))
}

fn aec_channel(tree: &AttributeInterfaceTree, index: u32) -> Arc<biamp_tesira::AecInputChannel> {
    match tree.get_interface("AEC1", ChannelType::Input, &[index]).unwrap() {
        Interface::AecInputChannel(channel) => channel,
        _ => panic!("expected an AEC input channel"),
    }
}

#[test]
fn nothing_is_sent_before_device_ready() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::AecInput, "AEC1").unwrap();
    let channel = aec_channel(&tree, 1);

    channel.set_gain(3.0).unwrap();
    channel.toggle_mute().unwrap();
    assert!(drain(&mut rx).is_empty());
    assert!(!channel.node().is_initialized());

    tree.on_device_connected();
    assert_eq!(
        drain(&mut rx),
        vec![
            "AEC1 get numChannels",
            "AEC1 get gain 1",
            "AEC1 subscribe gain 1",
            "AEC1 get mute 1",
            "AEC1 subscribe mute 1",
            "AEC1 get phantomPower 1",
        ]
    );
    assert!(channel.node().is_initialized());
}

#[test]
fn gain_set_round_trip() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::AecInput, "AEC1").unwrap();
    tree.on_device_connected();
    let channel = aec_channel(&tree, 3);
    drain(&mut rx);

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    channel.gain().observe(move |_: &f64| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    channel.set_gain(12.0).unwrap();
    assert_eq!(drain(&mut rx), vec!["AEC1 set gain 12 3"]);

    let gain = key("AEC1", "gain", &[3]);
    assert_eq!(
        tree.dispatch(&Response::reply(&gain, 12.0)),
        DispatchOutcome::Delivered
    );
    assert_eq!(channel.gain().get(), Some(12.0));
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    // Identical feedback is deduplicated
    assert_eq!(
        tree.dispatch(&Response::publish(&gain, 12.0)),
        DispatchOutcome::Delivered
    );
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[test]
fn dispose_unsubscribes_every_subscribed_key() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::AecInput, "AEC1").unwrap();
    tree.on_device_connected();
    let channel = aec_channel(&tree, 2);
    let subscribed = channel.node().subscriptions();
    assert_eq!(
        subscribed,
        vec![key("AEC1", "gain", &[2]), key("AEC1", "mute", &[2])]
    );
    drain(&mut rx);

    tree.remove_block("AEC1").unwrap();
    assert_eq!(
        drain(&mut rx),
        vec!["AEC1 unsubscribe gain 2", "AEC1 unsubscribe mute 2"]
    );
    for key in &subscribed {
        assert!(!tree.router().is_subscribed(key));
    }
    assert!(tree.router().subscriptions().is_empty());

    // Late feedback for the disposed channel goes nowhere
    assert_eq!(
        tree.dispatch(&Response::publish(&subscribed[0], 1.0)),
        DispatchOutcome::Unregistered
    );
    assert_eq!(channel.gain().get(), None);
}

#[test]
fn reported_channel_count_grows_children() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::Level, "Level1").unwrap();
    tree.on_device_connected();
    drain(&mut rx);

    tree.dispatch(&Response::reply(&key("Level1", "numChannels", &[]), 2_i64));
    let block = match tree.block("Level1").unwrap() {
        biamp_tesira::Block::Level(block) => block,
        _ => panic!("expected a level block"),
    };
    assert_eq!(block.channels().len(), 2);
    let sent = drain(&mut rx);
    assert!(sent.contains(&"Level1 subscribe level 2".to_string()));
    assert!(sent.contains(&"Level1 get label 1".to_string()));

    // A smaller count after reconnect leaves existing channels alone
    let first = block.channel(1).unwrap();
    tree.on_device_disconnected();
    tree.on_device_connected();
    assert_eq!(
        tree.dispatch(&Response::reply(&key("Level1", "numChannels", &[]), 1_i64)),
        DispatchOutcome::Delivered
    );
    assert_eq!(block.channels().len(), 2);
    assert!(first.node().is_alive());
    assert!(first.node().is_initialized());
}

#[test]
fn voip_line_count_shrink_resets_lines() {
    let (tree, mut rx) = tree();
    tree.on_device_connected();
    tree.add_block(BlockKind::Voip, "VoIP1").unwrap();
    let line_count = key("VoIP1", "lineCount", &[]);

    tree.dispatch(&Response::reply(&line_count, 4_i64));
    let Interface::VoipLine(line3) = tree.get_interface("VoIP1", ChannelType::Line, &[3]).unwrap()
    else {
        panic!("expected a VoIP line");
    };
    let Interface::VoipLine(line4) = tree.get_interface("VoIP1", ChannelType::Line, &[4]).unwrap()
    else {
        panic!("expected a VoIP line");
    };
    assert_eq!(line3.call_appearances().len(), 6);
    assert!(tree.router().is_subscribed(&key("VoIP1", "callState", &[4, 6])));
    drain(&mut rx);

    tree.dispatch(&Response::publish(&line_count, 2_i64));

    assert!(!line3.node().is_alive());
    assert!(!line4.node().is_alive());
    assert!(line4.call_appearances().is_empty());

    let subscriptions = tree.router().subscriptions();
    assert!(subscriptions
        .iter()
        .all(|key| !matches!(key.index_path.as_slice().first(), Some(3) | Some(4))));
    assert!(tree.router().is_subscribed(&key("VoIP1", "autoAnswer", &[1])));
    assert!(tree.router().is_subscribed(&key("VoIP1", "callState", &[2, 6])));

    let sent = drain(&mut rx);
    for line in ["VoIP1 unsubscribe autoAnswer 3", "VoIP1 unsubscribe callState 4 6"] {
        assert_eq!(sent.iter().filter(|sent| *sent == line).count(), 1, "{}", line);
    }
    assert!(sent.contains(&"VoIP1 subscribe dndEnable 2".to_string()));

    let Interface::Block(biamp_tesira::Block::Voip(voip)) =
        tree.get_interface("VoIP1", ChannelType::None, &[]).unwrap()
    else {
        panic!("expected the VoIP block");
    };
    let lines = voip.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.node().is_initialized()));
}

#[test]
fn call_appearance_state_and_services() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::Voip, "VoIP Dialer").unwrap();
    tree.on_device_connected();
    let Interface::CallAppearance(call) = tree
        .get_interface("VoIP Dialer", ChannelType::CallAppearance, &[1, 2])
        .unwrap()
    else {
        panic!("expected a call appearance");
    };
    drain(&mut rx);

    let state = ControlValue::try_from(json!({
        "callStateInfo": { "state": "VOIP_CALL_STATE_RINGING", "cid": "5551234" }
    }))
    .unwrap();
    tree.dispatch(&Response::publish(
        &key("VoIP Dialer", "callState", &[1, 2]),
        state,
    ));
    assert_eq!(call.call_state().get(), Some(CallState::Ringing));
    assert_eq!(call.caller_id().get().as_deref(), Some("5551234"));

    call.answer().unwrap();
    call.dial("555 1234").unwrap();
    call.dtmf('#').unwrap();
    assert!(call.dtmf('x').is_err());
    assert_eq!(
        drain(&mut rx),
        vec![
            "\"VoIP Dialer\" answer 1 2",
            "\"VoIP Dialer\" dial \"555 1234\" 1 2",
            "\"VoIP Dialer\" dtmf \"#\" 1 2",
        ]
    );
}

#[test]
fn unknown_call_state_still_updates_caller_id() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::Voip, "VoIP1").unwrap();
    tree.on_device_connected();
    let Interface::CallAppearance(call) = tree
        .get_interface("VoIP1", ChannelType::CallAppearance, &[1, 1])
        .unwrap()
    else {
        panic!("expected a call appearance");
    };
    drain(&mut rx);

    let route = key("VoIP1", "callState", &[1, 1]);
    let ringing = ControlValue::try_from(json!({
        "callStateInfo": { "state": "VOIP_CALL_STATE_RINGING", "cid": "5551234" }
    }))
    .unwrap();
    tree.dispatch(&Response::publish(&route, ringing));

    let bogus = ControlValue::try_from(json!({
        "callStateInfo": { "state": "BOGUS", "cid": "100" }
    }))
    .unwrap();
    assert_eq!(
        tree.dispatch(&Response::publish(&route, bogus)),
        DispatchOutcome::Delivered
    );
    assert_eq!(call.call_state().get(), Some(CallState::Ringing));
    assert_eq!(call.caller_id().get().as_deref(), Some("100"));
}

#[test]
fn mixer_crosspoints_hang_off_inputs() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::Mixer, "Mixer1").unwrap();
    tree.on_device_connected();
    drain(&mut rx);

    let Interface::Crosspoint(crosspoint) = tree
        .get_interface("Mixer1", ChannelType::Crosspoint, &[2, 3])
        .unwrap()
    else {
        panic!("expected a crosspoint");
    };
    let sent = drain(&mut rx);
    assert_eq!(
        &sent[sent.len() - 3..],
        &[
            "Mixer1 get crosspointLevelState 2 3",
            "Mixer1 subscribe crosspointLevelState 2 3",
            "Mixer1 get crosspointLevel 2 3",
        ]
    );

    crosspoint.toggle().unwrap();
    assert_eq!(drain(&mut rx), vec!["Mixer1 toggle crosspointLevelState 2 3"]);
}

#[test]
fn invalid_index_paths_are_errors() {
    let (tree, _rx) = tree();
    tree.add_block(BlockKind::Voip, "VoIP1").unwrap();

    assert!(matches!(
        tree.get_interface("VoIP1", ChannelType::CallAppearance, &[1]),
        Err(biamp_tesira::TesiraError::InvalidIndexPath { .. })
    ));
    assert!(matches!(
        tree.get_interface("VoIP1", ChannelType::Input, &[1]),
        Err(biamp_tesira::TesiraError::InvalidIndexPath { .. })
    ));
}

#[test]
fn reconnect_reissues_subscriptions() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::AecInput, "AEC1").unwrap();
    tree.on_device_connected();
    let channel = aec_channel(&tree, 1);
    let first = drain(&mut rx);

    tree.on_device_disconnected();
    assert!(drain(&mut rx).is_empty());
    assert!(tree.router().subscriptions().is_empty());
    assert!(!channel.node().is_initialized());

    channel.set_mute(true).unwrap();
    assert!(drain(&mut rx).is_empty());

    tree.on_device_connected();
    assert_eq!(drain(&mut rx), first);
    assert!(tree.router().is_subscribed(&key("AEC1", "gain", &[1])));
}

#[test]
fn repeated_ready_signal_reissues_subscriptions() {
    let (tree, mut rx) = tree();
    tree.add_block(BlockKind::AecInput, "AEC1").unwrap();
    tree.on_device_connected();
    let channel = aec_channel(&tree, 1);
    let first = drain(&mut rx);

    // Transport came back without reporting the drop
    tree.on_device_connected();
    assert_eq!(drain(&mut rx), first);
    assert!(channel.node().is_initialized());
    assert!(tree.router().is_subscribed(&key("AEC1", "gain", &[1])));
    assert_eq!(tree.router().pending(&key("AEC1", "numChannels", &[])), 1);
    assert_eq!(tree.router().pending(&key("AEC1", "gain", &[1])), 1);
}

#[test]
fn tree_from_config() {
    let config = DeviceConfig::from_json(
        r#"{
            "key": "dsp-1",
            "blocks": [
                { "kind": "aecInput", "instanceTag": "AEC1" },
                { "kind": "mixer", "instanceTag": "Mixer1" }
            ],
            "changeBuffer": 8
        }"#,
    )
    .unwrap();
    let (sender, mut rx) = CommandSender::channel();
    let tree = AttributeInterfaceTree::from_config(&config, sender).unwrap();

    assert_eq!(tree.device_key(), "dsp-1");
    assert_eq!(tree.blocks().len(), 2);
    tree.on_device_connected();
    assert_eq!(
        drain(&mut rx),
        vec![
            "AEC1 get numChannels",
            "Mixer1 get numInputs",
            "Mixer1 get numOutputs"
        ]
    );
}

#[tokio::test]
async fn changes_are_broadcast_once() {
    let (tree, _rx) = tree();
    tree.add_block(BlockKind::AecInput, "AEC1").unwrap();
    tree.on_device_connected();
    let channel = aec_channel(&tree, 1);
    let mut changes = tree.subscribe_changes();

    let gain = key("AEC1", "gain", &[1]);
    tree.dispatch(&Response::publish(&gain, 3.5));
    tree.dispatch(&Response::publish(&gain, 3.5));

    let change = changes.recv().await.unwrap();
    assert_eq!(change.node, channel.node().id());
    assert_eq!(change.instance_tag, "AEC1");
    assert_eq!(change.index_path.as_slice(), &[1]);
    assert_eq!(change.property, "gain");
    assert_eq!(change.value, ControlValue::Float(3.5));
    assert!(changes.try_recv().unwrap().is_none());
}
