use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use maclink_socket::{
    FailurePolicy, KeepaliveConfig, ListenerConfig, Message, NotificationListener,
};

use crate::cmd::{install_ctrlc_handler, parse_duration, parse_optional_duration, ListenArgs};
use crate::exit::{socket_error, CliResult, SUCCESS};
use crate::output::{print_notification, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = listener_config(&args)?;
    let mut listener =
        NotificationListener::new(config).map_err(|err| socket_error("listen failed", err))?;

    let cancel = listener.cancel_token();
    install_ctrlc_handler(cancel.clone())?;

    let printed = AtomicU64::new(0);
    let count = args.count;
    let mut observer = |message: &Message| -> maclink_socket::Result<()> {
        print_notification(message, format);
        let seen = printed.fetch_add(1, Ordering::SeqCst) + 1;
        if count.is_some_and(|limit| seen >= limit) {
            cancel.cancel();
        }
        Ok(())
    };

    listener
        .run(&mut observer)
        .map_err(|err| socket_error("listen failed", err))?;

    tracing::debug!(printed = printed.load(Ordering::SeqCst), "listener stopped");
    Ok(SUCCESS)
}

fn listener_config(args: &ListenArgs) -> CliResult<ListenerConfig> {
    let mut config = ListenerConfig::new(args.endpoint.clone());

    if let Some(topic) = &args.topic {
        config.topic = Bytes::from(topic.clone().into_bytes());
    }

    config.keepalive = if args.no_keepalive {
        None
    } else {
        Some(KeepaliveConfig {
            idle: parse_duration(&args.idle)?,
            interval: parse_duration(&args.interval)?,
            probes: args.probes,
        })
    };

    if let Some(delay) = parse_optional_duration(args.reconnect.as_deref())? {
        config.failure_policy = FailurePolicy::Reconnect { delay };
    }

    Ok(config)
}
