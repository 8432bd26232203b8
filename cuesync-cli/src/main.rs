use std::{
    cell::RefCell,
    fs::File,
    io::{self, BufRead, BufReader},
    rc::Rc,
    thread,
    time::Duration,
};

use anyhow::{Context, bail};
use crossbeam_channel::{Receiver, select, unbounded};

use cuesync_core::{
    commands::PlaylistEvent,
    config::QueueConfig,
    engine::MemoryEngine,
    queue::{PlaybackQueue, QueueHandle},
};

mod script;
mod sim;

use script::{Command, help_text, parse_line};
use sim::{OPEN_DELAY, SimTrack};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Args {
    window: Option<usize>,
    seed: Option<u64>,
    script: Option<String>,
}

fn main() -> anyhow::Result<()> {
    cuesync_core::init_logger()?;

    let args = parse_args(std::env::args().skip(1))?;
    let config = queue_config(&args)?;
    log::info!("Starting cuesync with a window of {}", config.window_capacity);

    let lines = spawn_reader(args.script)?;
    run(config, lines)
}

fn queue_config(args: &Args) -> anyhow::Result<QueueConfig> {
    let mut builder = QueueConfig::builder();
    if let Some(window) = args.window {
        builder = builder.window_capacity(window);
    }
    if let Some(seed) = args.seed {
        builder = builder.shuffle_seed(seed);
    }
    builder.build().context("invalid --window")
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = Args {
        window: None,
        seed: None,
        script: None,
    };
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--window" => {
                let value = raw.next().context("--window needs a value")?;
                args.window = Some(value.parse().with_context(|| format!("bad window '{}'", value))?);
            }
            "--seed" => {
                let value = raw.next().context("--seed needs a value")?;
                args.seed = Some(value.parse().with_context(|| format!("bad seed '{}'", value))?);
            }
            option if option.starts_with("--") => bail!("unknown option '{}'", option),
            _ => args.script = Some(arg),
        }
    }
    Ok(args)
}

/// Read script lines on a dedicated thread; the channel closes at end of input
fn spawn_reader(script: Option<String>) -> anyhow::Result<Receiver<String>> {
    let reader: Box<dyn BufRead + Send> = match script {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("cannot open script {}", path))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read input: {}", e);
                    break;
                }
            }
        }
    });
    Ok(rx)
}

fn run(config: QueueConfig, lines: Receiver<String>) -> anyhow::Result<()> {
    let (mut queue, handle) = PlaybackQueue::<SimTrack>::new(config);
    let engine = Rc::new(RefCell::new(MemoryEngine::with_notifier(handle.notifier.clone())));
    queue.attach_engine(&engine);

    loop {
        select! {
            recv(lines) -> line => match line {
                Ok(line) => {
                    let quit = match parse_line(&line) {
                        Ok(Some(command)) => execute(command, &mut queue, &engine),
                        Ok(None) => false,
                        Err(e) => {
                            println!("error: {:#}", e);
                            false
                        }
                    };
                    if quit {
                        break;
                    }
                }
                Err(_) => {
                    // let in-flight loads report before exiting
                    thread::sleep(OPEN_DELAY * 2);
                    drain(&mut queue, &handle);
                    break;
                }
            },
            default(POLL_INTERVAL) => {}
        }
        drain(&mut queue, &handle);
    }

    log::info!("Shutting down");
    Ok(())
}

/// Apply pending notifications and print what the queue reported
fn drain(queue: &mut PlaybackQueue<SimTrack>, handle: &QueueHandle<SimTrack>) {
    queue.process_pending();
    while let Ok(event) = handle.event_rx.try_recv() {
        print_event(&event);
    }
}

fn print_event(event: &PlaylistEvent<SimTrack>) {
    match event {
        PlaylistEvent::CurrentItemChanged { old, new } => println!(
            "current: {} -> {}",
            old.as_ref().map_or("-", SimTrack::name),
            new.as_ref().map_or("-", SimTrack::name)
        ),
        PlaylistEvent::ItemOpened(item) => println!("opened: {}", item),
        PlaylistEvent::ItemFailed { item, error } => println!("failed: {} ({})", item, error),
    }
}

/// Run one command, returns true when the driver should stop
fn execute(
    command: Command,
    queue: &mut PlaybackQueue<SimTrack>,
    engine: &Rc<RefCell<MemoryEngine<SimTrack>>>,
) -> bool {
    let result = match command {
        Command::Add(names) => {
            queue.extend(tracks(&names));
            Ok(())
        }
        Command::Insert { index, names } => queue.insert(index, tracks(&names)),
        Command::Remove { index, count } => queue.remove(index, count),
        Command::Replace { index, names } => queue.replace(index, tracks(&names)),
        Command::Clear => {
            queue.clear();
            Ok(())
        }
        Command::Next => {
            queue.move_next();
            Ok(())
        }
        Command::Prev => {
            queue.move_previous();
            Ok(())
        }
        Command::Goto(index) => queue.move_to(index),
        Command::Shuffle(on) => {
            queue.set_shuffle_enabled(on);
            Ok(())
        }
        Command::Repeat(on) => {
            queue.set_repeat_enabled(on);
            Ok(())
        }
        Command::End => {
            engine.borrow_mut().finish_current();
            Ok(())
        }
        Command::Attach => {
            queue.attach_engine(engine);
            Ok(())
        }
        Command::Detach => {
            queue.detach_engine(engine);
            Ok(())
        }
        Command::Show => {
            show(queue, engine);
            Ok(())
        }
        Command::Help => {
            println!("{}", help_text());
            Ok(())
        }
        Command::Quit => return true,
    };
    if let Err(e) = result {
        println!("error: {}", e);
    }
    false
}

fn tracks(names: &[String]) -> Vec<SimTrack> {
    names.iter().map(|name| SimTrack::new(name)).collect()
}

fn show(queue: &PlaybackQueue<SimTrack>, engine: &Rc<RefCell<MemoryEngine<SimTrack>>>) {
    let current = queue.current_index();
    for (index, item) in queue.items().enumerate() {
        let marker = if Some(index) == current { '>' } else { ' ' };
        println!("{} {:>3} {}", marker, index, item);
    }
    let order: Vec<&str> = queue.effective_order().into_iter().map(SimTrack::name).collect();
    println!(
        "order: [{}]  shuffle: {}  repeat: {}",
        order.join(", "),
        queue.is_shuffle_enabled(),
        queue.is_repeat_enabled()
    );
    if queue.is_engine_attached() {
        let engine = engine.borrow();
        let window: Vec<&str> = engine.entries().map(|entry| entry.item.name()).collect();
        println!("engine: [{}]", window.join(", "));
    } else {
        println!("engine: detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> anyhow::Result<Args> {
        parse_args(raw.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn parses_flags_and_script() {
        let parsed = args(&["--window", "2", "demo.txt", "--seed", "7"]).unwrap();
        assert_eq!(parsed.window, Some(2));
        assert_eq!(parsed.seed, Some(7));
        assert_eq!(parsed.script.as_deref(), Some("demo.txt"));
    }

    #[test]
    fn flag_without_value_is_an_error() {
        assert!(args(&["--window"]).is_err());
        assert!(args(&["--seed", "x"]).is_err());
    }

    #[test]
    fn window_without_room_for_a_successor_is_rejected() {
        let err = queue_config(&args(&["--window", "1"]).unwrap()).err().unwrap();
        assert_eq!(
            format!("{:#}", err),
            "invalid --window: window capacity 1 is below the minimum of 2"
        );
        assert_eq!(queue_config(&args(&["--window", "2"]).unwrap()).unwrap().window_capacity, 2);
    }

    #[test]
    fn unknown_options_are_not_taken_for_a_script() {
        let err = args(&["--help"]).err().unwrap();
        assert_eq!(err.to_string(), "unknown option '--help'");
        assert!(args(&["--windw", "2"]).is_err());
    }
}
