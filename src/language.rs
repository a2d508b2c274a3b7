//! Display names for programming and natural languages.
//!
//! Names are matched case-insensitively.  A multi-word name is mapped word by word, and any
//! unknown word maps to the default.

/// Default programming language for code tasks.
pub const DEFAULT_PROGRAMMING_LANGUAGE: &str = "JavaScript";

/// Default natural language for rewrites.
pub const DEFAULT_NATURAL_LANGUAGE: &str = "English";

fn programming_language_token(name: &str) -> &'static str {
    match name.to_lowercase().as_str() {
        "c" => "C",
        "c++" | "cpp" | "cplusplus" | "c-plus-plus" => "C++",
        "c#" | "cs" | "csharp" => "C#",
        "crystal" => "Crystal",
        "java" => "Java",
        "ecmascript" | "es6" => "ES6",
        "node" | "nodejs" | "node.js" => "Node.js",
        "ruby" => "Ruby",
        "rust" | "rs" => "Rust",
        "ts" | "typescript" => "TypeScript",
        "go" | "golang" => "Go",
        "py" | "python" => "Python",
        "sh" | "bash" => "Bash",
        "kotlin" | "kt" => "Kotlin",
        "swift" => "Swift",
        "php" => "PHP",
        "zig" => "Zig",
        _ => DEFAULT_PROGRAMMING_LANGUAGE,
    }
}

fn natural_language_token(name: &str) -> &'static str {
    match name.to_lowercase().as_str() {
        "en-us" => "United States English",
        "en-uk" => "United Kingdom English",
        "es" => "Spanish",
        "ru" => "Russian",
        "jp" => "Japanese",
        "ck" => "Chinese",
        _ => DEFAULT_NATURAL_LANGUAGE,
    }
}

fn map_words(name: &str, token: fn(&str) -> &'static str) -> String {
    let name = name.trim();
    if !name.contains(' ') {
        return token(name).to_string();
    }
    name.split_whitespace()
        .map(token)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The display name of a programming language, e.g. `"cpp"` becomes `"C++"`.
pub fn programming_language_name(name: &str) -> String {
    if name.trim().eq_ignore_ascii_case("c plus plus") {
        return "C++".to_string();
    }
    map_words(name, programming_language_token)
}

/// The display name of a natural language, e.g. `"es"` becomes `"Spanish"`.
pub fn natural_language_name(name: &str) -> String {
    map_words(name, natural_language_token)
}

/// The tag to put after an opening fence for a display name: `"Node.js"` becomes `"node.js"`.
pub fn fence_tag(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Guess the language from a file name's extension.
pub fn language_from_path(path: &str) -> Option<String> {
    let (stem, extension) = path.rsplit_once('.')?;
    if stem.is_empty() || stem.ends_with('/') || extension.contains('/') || extension.is_empty() {
        return None;
    }
    Some(extension.to_string())
}
