use livecalc::{Calculator, Error, FormatConfig, LineKind};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // `RUST_LOG=livecalc=debug` shows parse and evaluation activity on stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// The calculator plus the text of every line, which the host owns
struct Sheet {
    calc: Calculator,
    texts: Vec<String>,
}

impl Sheet {
    fn new(config: FormatConfig) -> Self {
        Sheet {
            calc: Calculator::with_config(config),
            texts: Vec::new(),
        }
    }

    fn insert(&mut self, index: usize) -> Result<(), Error> {
        self.calc.insert_line(index)?;
        self.texts.insert(index, String::new());
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Result<(), Error> {
        self.calc.remove_line(index)?;
        self.texts.remove(index);
        Ok(())
    }

    fn set(&mut self, index: usize, text: &str) -> Result<(), Error> {
        let slot = self.texts.get_mut(index).ok_or(Error::LineOutOfRange {
            index,
            len: self.calc.line_count(),
        })?;
        *slot = text.to_owned();
        self.calc.parse_line(text, index)
    }

    /// Formatted result, or the error in its place
    fn render(&mut self, index: usize) -> String {
        match self.calc.get_formatted_line(index) {
            Ok(text) => text,
            Err(e) => format!("Error: {e}"),
        }
    }

    fn show(&mut self) {
        if self.texts.is_empty() {
            println!("Sheet is empty.");
            return;
        }
        let selected = self
            .calc
            .evaluate_line()
            .unwrap_or(self.texts.len() - 1);
        for index in 0..self.texts.len() {
            let marker = if index == selected { '*' } else { ' ' };
            let text = self.texts[index].clone();
            let kind = match self.calc.line(index).map(|line| line.kind()) {
                Some(LineKind::Variable) => "var",
                Some(LineKind::Function) => "fn",
                _ => "",
            };
            println!("{marker}{index:>3} {kind:<3} {text:<30} => {}", self.render(index));
        }
    }

    fn save(&self, path: &str) -> Result<(), String> {
        let json = serde_json::to_string_pretty(&self.texts).map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| e.to_string())
    }

    fn load(&mut self, path: &str) -> Result<(), String> {
        let json = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let texts: Vec<String> = serde_json::from_str(&json).map_err(|e| e.to_string())?;

        *self = Sheet::new(self.calc.config());
        for text in &texts {
            let index = self.calc.add_line();
            self.texts.push(String::new());
            // Lines referring to later definitions are repaired when shown
            let _ = self.set(index, text);
        }
        Ok(())
    }
}

fn parse_index(arg: Option<&str>) -> Result<usize, String> {
    let arg = arg.ok_or("Missing line index")?;
    arg.parse::<usize>()
        .map_err(|_| format!("Not a line index: {arg}"))
}

fn run_repl() {
    println!("livecalc worksheet calculator");
    println!("Enter expressions like: 2pi r^2");
    println!("Define variables like: r = 3, and functions like: area(w, h) = w h");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut sheet = Sheet::new(FormatConfig::default());

    loop {
        match rl.readline("calc> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(line);

                if !line.starts_with(':') {
                    let index = sheet.calc.add_line();
                    sheet.texts.push(String::new());
                    let _ = sheet.set(index, line);
                    println!("[{index}] {}", sheet.render(index));
                    continue;
                }

                let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
                let rest = rest.trim();
                let mut args = rest.split_whitespace();

                let outcome: Result<(), String> = match command {
                    ":help" => {
                        print_help();
                        Ok(())
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    ":show" => {
                        sheet.show();
                        Ok(())
                    }
                    ":add" => {
                        let index = match args.next() {
                            Some(arg) => parse_index(Some(arg)),
                            None => Ok(sheet.texts.len()),
                        };
                        index.and_then(|index| sheet.insert(index).map_err(|e| e.to_string()))
                    }
                    ":rm" => parse_index(args.next())
                        .and_then(|index| sheet.remove(index).map_err(|e| e.to_string())),
                    ":set" => {
                        let (index, text) = rest.split_once(' ').unwrap_or((rest, ""));
                        parse_index(Some(index)).and_then(|index| {
                            // Parse errors are shown in place of the result
                            match sheet.set(index, text.trim()) {
                                Err(e @ Error::LineOutOfRange { .. }) => Err(e.to_string()),
                                _ => {
                                    println!("[{index}] {}", sheet.render(index));
                                    Ok(())
                                }
                            }
                        })
                    }
                    ":eval" => {
                        let value = match args.next() {
                            Some(arg) => parse_index(Some(arg)).and_then(|index| {
                                sheet.calc.evaluate_at(index).map_err(|e| e.to_string())
                            }),
                            None => sheet.calc.evaluate().map_err(|e| e.to_string()),
                        };
                        value.map(|value| println!("{value}"))
                    }
                    ":select" => {
                        let index = match args.next() {
                            Some(arg) => parse_index(Some(arg)).map(Some),
                            None => Ok(None),
                        };
                        index.and_then(|index| {
                            sheet
                                .calc
                                .set_evaluate_line(index)
                                .map_err(|e| e.to_string())
                        })
                    }
                    ":save" => match args.next() {
                        Some(path) => sheet.save(path),
                        None => Err("Missing file path".into()),
                    },
                    ":load" => match args.next() {
                        Some(path) => sheet.load(path).map(|()| sheet.show()),
                        None => Err("Missing file path".into()),
                    },
                    other => Err(format!("Unknown command {other}, try :help")),
                };

                if let Err(e) = outcome {
                    println!("Error: {e}");
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("Worksheet calculator:");
    println!("  <text>          - Append a line and show its result");
    println!("  :add [i]        - Insert an empty line at i (default: at the end)");
    println!("  :rm i           - Remove line i");
    println!("  :set i <text>   - Replace the text of line i");
    println!("  :show           - Show every line with its result");
    println!("  :eval [i]       - Evaluate line i, or the selected line");
    println!("  :select [i]     - Select the line :eval uses (none: the last line)");
    println!("  :save <path>    - Save the sheet as JSON");
    println!("  :load <path>    - Load a sheet saved with :save");
    println!("  :quit           - Exit the calculator");
    println!("  Ctrl+C          - Exit the calculator");
    println!();
    println!("Syntax:");
    println!("  Operators: + - * / ^ (all left-associative), postfix % and deg");
    println!("  Functions: sqrt, sin; constant: pi");
    println!("  Juxtaposition multiplies: 2pi, 3x, 2(1 + 2)");
    println!("  Variables: r = 3");
    println!("  Functions: f(a, b) = a^2 + b");
    println!();
    println!("Definitions are shown in postfix with user functions expanded:");
    println!("  f(a) = a * 2   =>   f(a) = a 2 *");
    println!();
}
