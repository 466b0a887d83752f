//! Line-oriented front-end on any reader and writer.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use colored::Colorize;

use super::FrontEnd;

const HELP: &str = "\
:in                 add an input node (in<k>)
:out                add an output node (out<k>)
:set NAME VALUE     move an input slider
:update             recompute the graph
:nodes              show every input and output
:help               show this help
:quit               leave the REPL
anything else is sent to the engine as a REPL command";

/// Reads commands until end of input or `:quit`.
pub fn run<R: BufRead, W: Write>(front_end: &mut FrontEnd, input: R, mut output: W) -> Result<()> {
    writeln!(
        output,
        "{} ({} inputs, :help for commands)",
        "emfrp-bridge".bold(),
        front_end.mode()
    )?;
    for line in input.lines() {
        let line = line.context("failed to read command")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mark = front_end.log().len();
        match dispatch(front_end, line, &mut output)? {
            Flow::Continue => {}
            Flow::Quit => break,
        }
        for entry in front_end.log().since(mark) {
            writeln!(output, "{}", paint(entry))?;
        }
        output.flush()?;
    }
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

fn dispatch<W: Write>(front_end: &mut FrontEnd, line: &str, output: &mut W) -> Result<Flow> {
    let Some(meta) = line.strip_prefix(':') else {
        front_end.submit_command(line);
        return Ok(Flow::Continue);
    };
    let mut words = meta.split_whitespace();
    match words.next().unwrap_or_default() {
        "in" => {
            if let Ok(name) = front_end.add_input_node() {
                writeln!(output, "added {}", name.cyan())?;
            }
        }
        "out" => {
            if let Ok(name) = front_end.add_output_node() {
                writeln!(output, "added {}", name.cyan())?;
            }
        }
        "set" => {
            let (Some(name), Some(value)) = (words.next(), words.next()) else {
                writeln!(output, "{} usage: :set NAME VALUE", "error:".red().bold())?;
                return Ok(Flow::Continue);
            };
            let Ok(value) = value.parse::<i32>() else {
                writeln!(output, "{} `{value}` is not an integer", "error:".red().bold())?;
                return Ok(Flow::Continue);
            };
            match front_end.input_index(name) {
                Some(index) => {
                    front_end.set_input(index, value);
                    print_nodes(front_end, output)?;
                }
                None => writeln!(output, "{} no input named `{name}`", "error:".red().bold())?,
            }
        }
        "update" => {
            if front_end.recompute().is_ok() {
                print_nodes(front_end, output)?;
            }
        }
        "nodes" => print_nodes(front_end, output)?,
        "help" => writeln!(output, "{HELP}")?,
        "quit" | "q" => return Ok(Flow::Quit),
        other => writeln!(output, "{} unknown command `:{other}`", "error:".red().bold())?,
    }
    Ok(Flow::Continue)
}

fn print_nodes<W: Write>(front_end: &FrontEnd, output: &mut W) -> Result<()> {
    for control in front_end.inputs() {
        writeln!(output, "  {}", control.label().green())?;
    }
    for control in front_end.outputs() {
        writeln!(output, "  {}", control.label().yellow())?;
    }
    Ok(())
}

fn paint(entry: &str) -> String {
    if entry == "Return Code:0" {
        entry.dimmed().to_string()
    } else if entry.starts_with("Return Code:") || entry.starts_with("Error: ") {
        entry.red().to_string()
    } else if entry.starts_with("Return Value:") {
        entry.bold().to_string()
    } else {
        entry.to_string()
    }
}
