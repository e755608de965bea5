use damflow_storage::split_extension;
use std::path::PathBuf;

use super::PreviewRequest;
use crate::error::PreviewError;

pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 1000;
const DEFAULT_LABEL: &str = "DOCUMENT";

pub fn output_name(base: &str) -> String {
    format!("thumb_{}.svg", base)
}

/// Writes an SVG card with the file type and name. No decoding involved.
pub async fn generate(request: &PreviewRequest<'_>) -> Result<PathBuf, PreviewError> {
    let output = request.output_dir.join(output_name(&request.base()));
    let svg = render(&label_for(request.original_name), request.original_name);
    tokio::fs::write(&output, svg).await?;
    Ok(output)
}

/// Uppercase extension of the name, or `DOCUMENT`.
pub fn label_for(name: &str) -> String {
    let ext = split_extension(name).1.trim_start_matches('.');
    if ext.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        ext.to_ascii_uppercase()
    }
}

pub fn render(label: &str, filename: &str) -> String {
    format!(
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
  <rect width="{w}" height="{h}" fill="#f4f5f7"/>
  <rect x="200" y="220" width="400" height="500" rx="24" fill="#ffffff" stroke="#c9ced6" stroke-width="4"/>
  <path d="M520 220 L600 300 L520 300 Z" fill="#c9ced6"/>
  <text x="400" y="500" font-family="Helvetica, Arial, sans-serif" font-size="72" font-weight="700" fill="#4a5568" text-anchor="middle">{label}</text>
  <text x="400" y="820" font-family="Helvetica, Arial, sans-serif" font-size="28" fill="#718096" text-anchor="middle">{name}</text>
</svg>
"##,
        w = CANVAS_WIDTH,
        h = CANVAS_HEIGHT,
        label = escape_xml(label),
        name = escape_xml(filename),
    )
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_from_extension() {
        assert_eq!(label_for("archive.zip"), "ZIP");
        assert_eq!(label_for("README"), "DOCUMENT");
    }

    #[test]
    fn test_render_escapes_filename() {
        let svg = render("TXT", "a<b>&\"c\".txt");
        assert!(svg.contains("a&lt;b&gt;&amp;&quot;c&quot;.txt"));
        assert!(svg.contains(r#"width="800" height="1000""#));
        assert!(!svg.contains("a<b>"));
    }

    #[tokio::test]
    async fn test_generate_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data-1-2.bin");
        let request = PreviewRequest {
            input: &input,
            stored_name: "data-1-2.bin",
            original_name: "data.bin",
            mime_type: "application/octet-stream",
            output_dir: dir.path(),
        };

        let output = generate(&request).await.unwrap();
        let svg = std::fs::read_to_string(output).unwrap();
        assert!(svg.contains(">BIN<"));
        assert!(svg.contains(">data.bin<"));
    }
}
