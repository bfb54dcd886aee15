use anyhow::{Context, Result};
use navtree::v1::StateTree;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Read a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

pub fn read_tree(path: &Path) -> Result<StateTree> {
    let content = read_input(path)?;
    StateTree::from_json(&content).with_context(|| format!("Failed to parse {:?}", path))
}

pub fn encode_tree(tree: &StateTree, pretty: bool) -> Result<String> {
    let json = if pretty {
        tree.to_json_pretty()?
    } else {
        tree.to_json()?
    };
    Ok(json)
}

/// Write `text` to `output`, or to stdout when no output file is given.
pub fn write_output(text: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", text)?;
            Ok(())
        }
    }
}

pub fn write_tree(tree: &StateTree, output: Option<&PathBuf>, pretty: bool) -> Result<()> {
    write_output(&encode_tree(tree, pretty)?, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtree::v1::{State, Widget};
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out/model.json");
        let tree = StateTree::new(State::home().with_widget(Widget::action("w1")));

        write_tree(&tree, Some(&path), true).unwrap();
        assert_eq!(read_tree(&path).unwrap(), tree);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_tree(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_read_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let err = read_tree(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
