//! Home-automation grammar: build it, check it, and send it.
//!
//! Run with:
//!   cargo run --example home-grammar
//!
//! Pass an endpoint to send the commands instead of printing them:
//!   cargo run --features cli -- serve &
//!   cargo run --example home-grammar -- ipc:///tmp/ml_cmd

use std::collections::BTreeMap;

use maclink::grammar::{Command, GrammarSpec, LoadPlan, Reply};
use maclink::socket::{CommandClient, Endpoint};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let grammar = GrammarSpec::new("home")
        .public_rule(
            "doors",
            "(open | lock | close) ([the] <door> door | all doors)",
        )
        .public_rule("lights", "turn (on | off) [the] {room} lights")
        .public_rule("cat", "feed [the] (cat | kitty)")
        .private_rule("door", "{door}");

    let mut lists = BTreeMap::new();
    lists.insert(
        "room".to_string(),
        vec!["kitchen".to_string(), "bedroom".to_string(), "living room".to_string()],
    );
    lists.insert(
        "door".to_string(),
        vec!["front".to_string(), "side".to_string(), "garage".to_string()],
    );

    let plan = LoadPlan { grammar, lists };
    let summary = plan.check()?;
    eprintln!("grammar ok; lists: {:?}", summary.lists);

    let mut commands = plan.commands();
    commands.push(Command::Enable {
        name: "home".to_string(),
        priority: None,
    });

    let Some(endpoint) = std::env::args().nth(1) else {
        for command in &commands {
            println!("{}", command.to_json()?);
        }
        return Ok(());
    };

    let mut client = CommandClient::with_endpoint(Endpoint::parse(&endpoint)?);
    for command in &commands {
        let reply = client.call(command)?;
        let parsed = Reply::parse(&reply)?;
        eprintln!("{} -> success={}", command.kind(), parsed.success);
    }
    client.close();
    Ok(())
}
