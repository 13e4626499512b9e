//! Menu-driven mode used when no subcommand is given.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use boxforge::ForgeRuntime;
use boxforge::templates::scaffold::BASE_IMAGES;

use super::build;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuChoice {
    AddTemplate,
    BuildImages,
}

pub async fn execute(global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;

    let choice = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();

        let choice = prompt_menu(&mut input, &mut output)?;
        if choice == Some(MenuChoice::AddTemplate) {
            add_template(&runtime, &mut input, &mut output)?;
        }
        choice
    };

    match choice {
        Some(MenuChoice::BuildImages) => build::run(&runtime).await,
        _ => Ok(()),
    }
}

/// Show the main menu; `None` for anything but a listed option.
pub fn prompt_menu<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<Option<MenuChoice>> {
    writeln!(out, "Select an option")?;
    writeln!(out, "    1: Add Template")?;
    writeln!(out, "    2: Build Images")?;

    let choice = match read_answer(input, out)?.as_deref() {
        Some("1") => Some(MenuChoice::AddTemplate),
        Some("2") => Some(MenuChoice::BuildImages),
        _ => {
            writeln!(out, "Invalid selection, exiting")?;
            None
        }
    };
    Ok(choice)
}

/// Ask for a template name and a base image, then scaffold the template.
///
/// Returns `None` when the user gives up after a name collision or an
/// invalid image selection, or input ends.
pub fn add_template<R: BufRead, W: Write>(
    runtime: &ForgeRuntime,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<Option<PathBuf>> {
    let store = runtime.layout().template_store();

    let name = loop {
        writeln!(out, "New template name")?;
        let Some(name) = read_answer(input, out)? else {
            return Ok(None);
        };
        if !store.contains(&name) {
            break name;
        }

        writeln!(out, "Template '{name}' already exists, try again?")?;
        if !confirm(input, out)? {
            writeln!(out, "Exiting")?;
            return Ok(None);
        }
    };

    let base_image = loop {
        writeln!(out, "Select the base image for the container")?;
        for (i, (label, _)) in BASE_IMAGES.iter().enumerate() {
            writeln!(out, "{}: {}", i + 1, label)?;
        }

        let Some(answer) = read_answer(input, out)? else {
            return Ok(None);
        };
        let selected = answer
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| BASE_IMAGES.get(i));
        if let Some((_, image)) = selected {
            break *image;
        }

        writeln!(out, "Invalid image selected, try again?")?;
        if !confirm(input, out)? {
            writeln!(out, "Exiting")?;
            return Ok(None);
        }
    };

    let dir = runtime.add_template(&name, base_image)?;
    writeln!(out, "Template created at {}", dir.display())?;
    Ok(Some(dir))
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<Option<String>> {
    write!(out, "> ")?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<bool> {
    write!(out, "Y/N")?;
    Ok(read_answer(input, out)?.is_some_and(|a| a.eq_ignore_ascii_case("y")))
}
