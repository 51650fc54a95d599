//! Terminal input device: turns typed commands into framed control events

use anyhow::{bail, Context, Result};
use gamepad_shared::{codec, CommandCatalog, ControlEvent, Envelope, Header};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_TARGET: &str = "127.0.0.1:3001";
const DEFAULT_DEVICE_ID: &str = "input-relay";

#[derive(Debug, PartialEq)]
enum Line {
    Send(ControlEvent),
    Help,
    Quit,
    Empty,
}

fn parse_line(line: &str) -> Result<Line> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(Line::Empty);
    };

    let parsed = match first {
        "help" => Line::Help,
        "quit" | "exit" => Line::Quit,
        "animate" => {
            let Some(animation) = words.next() else {
                bail!("usage: animate <name> [duration-ms]");
            };
            let duration = words
                .next()
                .map(|raw| raw.parse::<f64>())
                .transpose()
                .with_context(|| format!("invalid duration for {}", animation))?;
            Line::Send(ControlEvent::animate(animation, duration))
        }
        action => match words.next() {
            Some(raw) => {
                let speed = raw
                    .parse::<f64>()
                    .with_context(|| format!("invalid speed {:?}", raw))?;
                Line::Send(ControlEvent::movement(action, speed))
            }
            None => Line::Send(ControlEvent::action(action)),
        },
    };

    if words.next().is_some() {
        bail!("too many arguments");
    }
    Ok(parsed)
}

fn list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_help(catalog: &CommandCatalog) {
    println!("Commands:");
    println!("  <movement> [speed]   {}", list(catalog.movements()));
    println!("  <action>             {}", list(catalog.actions()));
    println!("  animate <name> [ms]  {}", list(catalog.animations()));
    println!("  help | quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let target = std::env::var("INPUT_RELAY_TARGET").unwrap_or_else(|_| DEFAULT_TARGET.into());
    let device_id =
        std::env::var("INPUT_RELAY_DEVICE_ID").unwrap_or_else(|_| DEFAULT_DEVICE_ID.into());

    let mut stream = TcpStream::connect(&target)
        .await
        .with_context(|| format!("connecting to relay at {}", target))?;
    info!("Connected to {} as {}", target, device_id);

    let catalog = CommandCatalog::standard();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sequence_id = 0u64;

    while let Some(line) = lines.next_line().await? {
        let event = match parse_line(&line) {
            Ok(Line::Send(event)) => event,
            Ok(Line::Help) => {
                print_help(&catalog);
                continue;
            }
            Ok(Line::Quit) => break,
            Ok(Line::Empty) => continue,
            Err(e) => {
                warn!("{:#}", e);
                continue;
            }
        };

        sequence_id += 1;
        let frame = codec::encode(&Envelope::control(
            Header::new(device_id.as_str(), sequence_id),
            event,
        ))?;
        stream
            .write_all(&frame)
            .await
            .context("relay connection lost")?;
        debug!("Sent seq={} ({} bytes)", sequence_id, frame.len());
    }

    stream.shutdown().await.ok();
    info!("Input relay stopped");
    Ok(())
}
