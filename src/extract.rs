//! Pulls the generated script out of a free-form model reply

use once_cell::sync::Lazy;
use regex::Regex;

static PYTHON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```python[ \t]*\r?\n?(.*?)```").expect("python fence regex")
});

static BARE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*\r?\n(.*?)```").expect("bare fence regex"));

static NUMPY_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)import numpy as np[ \t]*\r?\n?(.*?)(?:```|\z)").expect("numpy anchor regex")
});

/// Extract the Python script from a model reply.
///
/// Tried in order: the first non-empty ```` ```python ```` block, then the first
/// unlabelled fence whose body imports something, then everything following
/// `import numpy as np` up to a closing fence or the end of the reply.
pub fn extract_python_code(text: &str) -> Option<String> {
    let fenced = PYTHON_FENCE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .find(|body| !body.is_empty());
    if let Some(body) = fenced {
        return Some(body.to_string());
    }

    let bare = BARE_FENCE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .find(|body| body.contains("import"));
    if let Some(body) = bare {
        return Some(body.to_string());
    }

    NUMPY_ANCHOR.captures(text).and_then(|c| {
        let rest = c.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if rest.is_empty() {
            None
        } else {
            Some(format!("import numpy as np\n{}", rest))
        }
    })
}
