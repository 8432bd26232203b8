use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use strum::{EnumIter, EnumMessage, EnumString, IntoEnumIterator};

/// Command words understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, EnumMessage, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Verb {
    #[strum(message = "add NAME...            append items")]
    Add,
    #[strum(message = "insert INDEX NAME...   insert items at INDEX")]
    Insert,
    #[strum(message = "remove INDEX [COUNT]   remove COUNT items (default 1)")]
    Remove,
    #[strum(message = "replace INDEX NAME...  overwrite items from INDEX")]
    Replace,
    #[strum(message = "clear                  drop every item")]
    Clear,
    #[strum(message = "next                   move to the next item")]
    Next,
    #[strum(message = "prev                   move to the previous item")]
    Prev,
    #[strum(message = "goto INDEX             make the item at INDEX active")]
    Goto,
    #[strum(message = "shuffle on|off         toggle shuffle")]
    Shuffle,
    #[strum(message = "repeat on|off          toggle repeat")]
    Repeat,
    #[strum(message = "end                    let the active item finish")]
    End,
    #[strum(message = "attach                 attach the engine")]
    Attach,
    #[strum(message = "detach                 detach the engine")]
    Detach,
    #[strum(message = "show                   print playlist and engine window")]
    Show,
    #[strum(message = "help                   this text")]
    Help,
    #[strum(message = "quit                   exit")]
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(Vec<String>),
    Insert { index: usize, names: Vec<String> },
    Remove { index: usize, count: usize },
    Replace { index: usize, names: Vec<String> },
    Clear,
    Next,
    Prev,
    Goto(usize),
    Shuffle(bool),
    Repeat(bool),
    End,
    Attach,
    Detach,
    Show,
    Help,
    Quit,
}

/// Parse one script line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let verb = Verb::from_str(word).map_err(|_| anyhow!("unknown command '{}', try 'help'", word))?;
    let args: Vec<&str> = words.collect();

    let command = match verb {
        Verb::Add => Command::Add(names(verb, &args)?),
        Verb::Insert => Command::Insert {
            index: index_arg(verb, &args)?,
            names: names(verb, &args[1..])?,
        },
        Verb::Remove => Command::Remove {
            index: index_arg(verb, &args)?,
            count: match args.get(1) {
                Some(count) => count.parse().with_context(|| format!("bad count '{}'", count))?,
                None => 1,
            },
        },
        Verb::Replace => Command::Replace {
            index: index_arg(verb, &args)?,
            names: names(verb, &args[1..])?,
        },
        Verb::Clear => Command::Clear,
        Verb::Next => Command::Next,
        Verb::Prev => Command::Prev,
        Verb::Goto => Command::Goto(index_arg(verb, &args)?),
        Verb::Shuffle => Command::Shuffle(switch_arg(verb, &args)?),
        Verb::Repeat => Command::Repeat(switch_arg(verb, &args)?),
        Verb::End => Command::End,
        Verb::Attach => Command::Attach,
        Verb::Detach => Command::Detach,
        Verb::Show => Command::Show,
        Verb::Help => Command::Help,
        Verb::Quit => Command::Quit,
    };
    Ok(Some(command))
}

pub fn help_text() -> String {
    Verb::iter()
        .filter_map(|verb| verb.get_message())
        .collect::<Vec<_>>()
        .join("\n")
}

fn index_arg(verb: Verb, args: &[&str]) -> anyhow::Result<usize> {
    let Some(raw) = args.first() else {
        bail!("{} needs an index", verb);
    };
    raw.parse().with_context(|| format!("bad index '{}'", raw))
}

fn names(verb: Verb, args: &[&str]) -> anyhow::Result<Vec<String>> {
    if args.is_empty() {
        bail!("{} needs at least one item name", verb);
    }
    Ok(args.iter().map(|name| name.to_string()).collect())
}

fn switch_arg(verb: Verb, args: &[&str]) -> anyhow::Result<bool> {
    match args.first().copied() {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => bail!("{} takes 'on' or 'off'", verb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mutations() {
        assert_eq!(
            parse_line("insert 2 a b").unwrap(),
            Some(Command::Insert {
                index: 2,
                names: vec!["a".into(), "b".into()],
            })
        );
        assert_eq!(
            parse_line("remove 1").unwrap(),
            Some(Command::Remove { index: 1, count: 1 })
        );
        assert_eq!(
            parse_line("  remove 0 3 ").unwrap(),
            Some(Command::Remove { index: 0, count: 3 })
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("# setup").unwrap(), None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_line("jump 3").is_err());
        assert!(parse_line("goto x").is_err());
        assert!(parse_line("insert 1").is_err());
        assert!(parse_line("shuffle maybe").is_err());
    }

    #[test]
    fn help_lists_every_verb() {
        let help = help_text();
        assert_eq!(help.lines().count(), Verb::iter().count());
        assert!(help.contains("goto INDEX"));
    }
}
