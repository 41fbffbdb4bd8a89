use std::time::Instant;

use maclink_grammar::LoadPlan;
use maclink_socket::{ClientConfig, CommandClient};

use crate::cmd::call::reply_exit_code;
use crate::cmd::{parse_optional_duration, LoadArgs};
use crate::exit::{grammar_error, socket_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_elapsed, print_raw, print_reply, OutputFormat};

pub fn run(args: LoadArgs, format: OutputFormat) -> CliResult<i32> {
    let plan = LoadPlan::from_path(&args.file).map_err(|err| grammar_error("load failed", err))?;
    let summary = plan
        .check()
        .map_err(|err| grammar_error("invalid grammar", err))?;

    for list in summary.lists.iter().filter(|l| !plan.lists.contains_key(*l)) {
        tracing::warn!(grammar = %plan.grammar.name, list = %list, "list has no items in load file");
    }

    let mut requests = Vec::new();
    for command in plan.commands() {
        let json = command
            .to_json()
            .map_err(|err| grammar_error("encode failed", err))?;
        requests.push((command.kind(), json));
    }

    if args.dry_run {
        for (_, json) in &requests {
            print_raw(json.as_bytes());
            print_raw(b"\n");
        }
        return Ok(SUCCESS);
    }

    let config = ClientConfig {
        reply_timeout: parse_optional_duration(args.timeout.as_deref())?,
        ..ClientConfig::new(args.endpoint)
    };
    let mut client = CommandClient::new(config);

    let started = Instant::now();
    let mut code = SUCCESS;
    for (kind, json) in &requests {
        let reply = client
            .call_raw(json.as_bytes())
            .map_err(|err| socket_error(&format!("{kind} failed"), err))?;
        print_reply(kind, &reply, format);
        if reply_exit_code(&reply) != SUCCESS {
            code = FAILURE;
        }
    }
    client.close();

    print_elapsed(requests.len(), started.elapsed(), format);
    Ok(code)
}
