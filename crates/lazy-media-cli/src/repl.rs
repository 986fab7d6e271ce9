//! Interactive REPL over one shared resolver.
//!
//! Launch with `lazy-media repl`. Type `/help` for available commands, Tab
//! for completion.

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use lazy_media::catalog::COURSE_KEYWORDS;
use lazy_media::resolver::DEFAULT_SRCSET_BASE_HEIGHT;
use lazy_media::{CatalogSection, UrlResolver};

/// Available REPL commands.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/category", "Internship category image"),
    ("/course", "Course category image (keyword match)"),
    ("/responsive", "Responsive URL: <id> <width> <height> [quality]"),
    ("/srcset", "Srcset for an id: <id> [base-height]"),
    ("/optimized", "Breakpoint-sized URL: <id> <viewport-width>"),
    ("/fail", "Record a locator as failed"),
    ("/failed", "Check a locator, or list all failures"),
    ("/clear", "Clear the failure cache"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
#[derive(Default)]
struct MediaHelper;

impl Completer for MediaHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        // category name completion
        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        let keys: Vec<&str> = match cmd {
            "/category" => CatalogSection::Internships.keys().collect(),
            "/course" => COURSE_KEYWORDS.iter().map(|(_, key)| *key).collect(),
            _ => return Ok((pos, Vec::new())),
        };
        let prefix_start = input.len() - args.len();
        let matches: Vec<Pair> = keys
            .iter()
            .filter(|k| k.to_lowercase().starts_with(&args.to_lowercase()))
            .map(|k| Pair {
                display: k.to_string(),
                replacement: k.to_string(),
            })
            .collect();
        Ok((prefix_start, matches))
    }
}

impl Hinter for MediaHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for MediaHelper {}
impl Validator for MediaHelper {}
impl Helper for MediaHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// What a REPL line asked for.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Lines to print.
    Output(Vec<String>),
    Help,
    Exit,
}

/// Execute one REPL line against `resolver`.
pub fn execute(resolver: &UrlResolver, line: &str) -> Reply {
    let input = line.trim();
    let input = input.strip_prefix('/').unwrap_or(input);
    if input.is_empty() {
        return Reply::Help;
    }

    let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
    let args = args.trim();

    let lines = match cmd {
        "exit" | "quit" => return Reply::Exit,
        "help" | "h" | "?" => return Reply::Help,
        "category" => vec![resolver.category_image(args)],
        "course" => vec![resolver.course_category_image(args)],
        "responsive" => cmd_responsive(resolver, args),
        "srcset" => cmd_srcset(resolver, args),
        "optimized" => cmd_optimized(resolver, args),
        "fail" => {
            if args.is_empty() {
                vec!["Usage: /fail <locator>".to_string()]
            } else if resolver.failures().record(args) {
                vec![format!("Recorded failure: {args}")]
            } else {
                vec![format!("Not recorded: {args}")]
            }
        }
        "failed" => {
            if args.is_empty() {
                let all = resolver.failures().snapshot();
                if all.is_empty() {
                    vec!["No failed locators.".to_string()]
                } else {
                    all
                }
            } else {
                vec![resolver.has_failed(args).to_string()]
            }
        }
        "clear" => {
            let count = resolver.failures().len();
            resolver.clear_failed_cache();
            vec![format!("Cleared {count} failed locators.")]
        }
        _ => vec![format!("Unknown command '/{cmd}'. Type /help for commands.")],
    };
    Reply::Output(lines)
}

fn numbers(args: &[&str]) -> Option<Vec<u32>> {
    args.iter().map(|a| a.parse().ok()).collect()
}

fn cmd_responsive(resolver: &UrlResolver, args: &str) -> Vec<String> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let usage = || vec!["Usage: /responsive <id> <width> <height> [quality]".to_string()];
    let Some((id, rest)) = parts.split_first() else {
        return usage();
    };
    match numbers(rest).as_deref() {
        Some([w, h]) => vec![resolver.responsive_image(id, *w, *h)],
        Some([w, h, q]) => match u8::try_from(*q) {
            Ok(q) => vec![resolver.responsive_image_with_quality(id, *w, *h, q)],
            Err(_) => usage(),
        },
        _ => usage(),
    }
}

fn cmd_srcset(resolver: &UrlResolver, args: &str) -> Vec<String> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let Some((id, rest)) = parts.split_first() else {
        return vec!["Usage: /srcset <id> [base-height]".to_string()];
    };
    let base = match numbers(rest).as_deref() {
        Some([base]) => *base,
        _ => DEFAULT_SRCSET_BASE_HEIGHT,
    };
    let entries = resolver.responsive_descriptors(id, base);
    if entries.is_empty() {
        return vec![resolver.responsive_srcset(id, base)];
    }
    entries.iter().map(ToString::to_string).collect()
}

fn cmd_optimized(resolver: &UrlResolver, args: &str) -> Vec<String> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    match parts.as_slice() {
        [id, width] => match width.parse() {
            Ok(width) => vec![resolver.optimized_url(id, width)],
            Err(_) => vec!["Usage: /optimized <id> <viewport-width>".to_string()],
        },
        _ => vec!["Usage: /optimized <id> <viewport-width>".to_string()],
    }
}

/// Run the interactive REPL.
pub fn run(resolver: &UrlResolver) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mlazy-media v{}\x1b[0m \x1b[90m(host {})\x1b[0m",
        env!("CARGO_PKG_VERSION"),
        resolver.host()
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<MediaHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(MediaHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".lazy_media_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mmedia>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match execute(resolver, &line) {
                    Reply::Output(lines) => {
                        for line in lines {
                            println!("  {line}");
                        }
                    }
                    Reply::Help => cmd_help(),
                    Reply::Exit => {
                        eprintln!("  Goodbye!");
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completes commands and category names.");
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(reply: Reply) -> Vec<String> {
        match reply {
            Reply::Output(lines) => lines,
            other => panic!("expected output, got {other:?}"),
        }
    }

    #[test]
    fn test_control_commands() {
        let resolver = UrlResolver::default();
        assert_eq!(execute(&resolver, "/exit"), Reply::Exit);
        assert_eq!(execute(&resolver, "/"), Reply::Help);
        assert_eq!(execute(&resolver, "help"), Reply::Help);
    }

    #[test]
    fn test_lookup_commands() {
        let resolver = UrlResolver::default();
        assert_eq!(
            output(execute(&resolver, "/category Data Science")),
            vec![resolver.category_image("Data Science")]
        );
        assert_eq!(
            output(execute(&resolver, "/course Advanced Programming")),
            vec![resolver.course_category_image("Advanced Programming")]
        );
        assert_eq!(
            output(execute(&resolver, "/responsive photo-1 400 300 60")),
            vec![resolver.responsive_image_with_quality("photo-1", 400, 300, 60)]
        );
        assert_eq!(output(execute(&resolver, "/srcset photo-1")).len(), 5);
    }

    #[test]
    fn test_bad_arguments_print_usage() {
        let resolver = UrlResolver::default();
        let lines = output(execute(&resolver, "/responsive photo-1 wide"));
        assert!(lines[0].starts_with("Usage"));
        let lines = output(execute(&resolver, "/optimized photo-1"));
        assert!(lines[0].starts_with("Usage"));
    }

    #[test]
    fn test_failure_commands() {
        let resolver = UrlResolver::default();
        let url = "https://x/a.jpg";
        assert_eq!(output(execute(&resolver, &format!("/failed {url}"))), vec!["false"]);
        execute(&resolver, &format!("/fail {url}"));
        assert_eq!(output(execute(&resolver, &format!("/failed {url}"))), vec!["true"]);
        assert_eq!(output(execute(&resolver, "/failed")), vec![url.to_string()]);

        let fallback = resolver.fallback().to_string();
        let lines = output(execute(&resolver, &format!("/fail {fallback}")));
        assert!(lines[0].starts_with("Not recorded"));

        execute(&resolver, "/clear");
        assert!(!resolver.has_failed(url));
    }
}
