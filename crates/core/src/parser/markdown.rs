//! Markdown structure used by the hybrid parser: `##` sections and fenced blocks.

/// A `##`-delimited section.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Section {
    pub name: String,
    /// 1-based physical line of the header.
    pub header_line: usize,
    pub body: String,
    /// Number of physical lines before the body.
    pub body_offset: usize,
}

/// Content of a ```` ```yaml ```` (or bare ```` ``` ````) block.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FencedBlock {
    pub content: String,
    pub offset: usize,
}

/// Header text of a `##`-or-deeper Markdown header at column 0.
pub(crate) fn header_name(line: &str) -> Option<&str> {
    if !line.starts_with("##") {
        return None;
    }
    let rest = line.trim_start_matches('#');
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest.trim();
    (!name.is_empty()).then_some(name)
}

fn fence_info(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("```")
        .or_else(|| trimmed.strip_prefix("~~~"))
        .map(str::trim)
}

/// Splits `text` into the prose before the first header and the sections.
/// Header-looking lines inside fenced blocks are content, not headers.
pub(crate) fn split_sections(text: &str) -> (String, Vec<Section>) {
    let mut preamble: Vec<&str> = Vec::new();
    let mut sections: Vec<(usize, String, Vec<&str>)> = Vec::new();
    let mut in_fence = false;

    for (index, line) in text.lines().enumerate() {
        if fence_info(line).is_some() {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some(name) = header_name(line) {
                sections.push((index, name.to_string(), Vec::new()));
                continue;
            }
        }
        match sections.last_mut() {
            Some((_, _, body)) => body.push(line),
            None => preamble.push(line),
        }
    }

    let sections = sections
        .into_iter()
        .map(|(index, name, body)| Section {
            name,
            header_line: index + 1,
            body: body.join("\n"),
            body_offset: index + 1,
        })
        .collect();
    (preamble.join("\n"), sections)
}

/// YAML fenced blocks of `text`; other languages are skipped.
pub(crate) fn fenced_yaml_blocks(text: &str, base_offset: usize) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(usize, bool, Vec<&str>)> = None;

    for (index, line) in text.lines().enumerate() {
        let Some(info) = fence_info(line) else {
            if let Some((_, _, body)) = open.as_mut() {
                body.push(line);
            }
            continue;
        };
        match open.take() {
            None => {
                let language = info.to_ascii_lowercase();
                let is_yaml = matches!(language.as_str(), "" | "yaml" | "yml");
                open = Some((index + 1, is_yaml, Vec::new()));
            }
            Some((start, is_yaml, body)) => {
                if is_yaml {
                    blocks.push(FencedBlock {
                        content: body.join("\n"),
                        offset: base_offset + start,
                    });
                }
            }
        }
    }

    if let Some((start, true, body)) = open {
        blocks.push(FencedBlock {
            content: body.join("\n"),
            offset: base_offset + start,
        });
    }
    blocks
}
