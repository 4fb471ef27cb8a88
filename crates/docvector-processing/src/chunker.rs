//! Fixed-size and semantic chunking (spec §4.4), ported from the original
//! implementation's `chunkers/fixed_size.py` and `chunkers/semantic.py`.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub index: i32,
    pub start_char: i32,
    pub end_char: i32,
}

/// Splits `text` into chunks of at most `chunk_size` characters, preferring
/// to break at the last occurrence of `separator` within
/// `[start + chunk_size/2, start + chunk_size]`, advancing by
/// `chunk_size - overlap` each step.
///
/// Panics (via the caller's validation) is not this function's job — callers
/// must ensure `overlap < chunk_size`.
pub fn chunk_fixed_size(text: &str, chunk_size: usize, overlap: usize, separator: &str) -> Vec<TextChunk> {
    if text.is_empty() {
        return Vec::new();
    }
    debug_assert!(overlap < chunk_size, "chunk_overlap must be less than chunk_size");

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0i32;

    while start < len {
        let mut end = (start + chunk_size).min(len);

        if end < len {
            let window_start = start + chunk_size / 2;
            if let Some(sep_pos) = rfind_in_window(&chars, separator, window_start, end) {
                end = sep_pos + separator.chars().count();
            }
        }

        let slice: String = chars[start..end].iter().collect();
        let trimmed = slice.trim();
        if !trimmed.is_empty() {
            chunks.push(TextChunk {
                content: trimmed.to_string(),
                index,
                start_char: start as i32,
                end_char: end as i32,
            });
            index += 1;
        }

        let mut next_start = end.saturating_sub(overlap);
        if next_start <= end.saturating_sub(chunk_size) {
            next_start = end;
        }
        if next_start <= start {
            next_start = end;
        }
        start = next_start;
    }

    chunks
}

fn rfind_in_window(chars: &[char], separator: &str, window_start: usize, window_end: usize) -> Option<usize> {
    if separator.is_empty() {
        return None;
    }
    let sep_chars: Vec<char> = separator.chars().collect();
    let search_end = window_end.min(chars.len());
    if window_start >= search_end {
        return None;
    }
    let mut pos = search_end.saturating_sub(sep_chars.len());
    loop {
        if pos < window_start {
            return None;
        }
        if chars[pos..].starts_with(sep_chars.as_slice()) {
            return Some(pos);
        }
        if pos == 0 {
            return None;
        }
        pos -= 1;
    }
}

static SECTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(?=#{1,6}\s)|\n\n+").unwrap());

/// Splits at heading boundaries and blank-line runs; sections under
/// `max_chunk_size` become single chunks, larger ones are packed
/// paragraph-by-paragraph, and oversized single paragraphs are hard-split.
pub fn chunk_semantic(text: &str, max_chunk_size: usize) -> Vec<TextChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let sections: Vec<&str> = SECTION_PATTERN
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut chunks = Vec::new();
    let mut index = 0i32;
    let mut char_offset = 0i32;

    for section in sections {
        let section_chunks = chunk_section(section, char_offset, index, max_chunk_size);
        index += section_chunks.len() as i32;
        chunks.extend(section_chunks);
        char_offset += section.chars().count() as i32 + 2;
    }

    chunks
}

fn chunk_section(section: &str, start_offset: i32, start_index: i32, max_size: usize) -> Vec<TextChunk> {
    if section.chars().count() <= max_size {
        return vec![TextChunk {
            content: section.to_string(),
            index: start_index,
            start_char: start_offset,
            end_char: start_offset + section.chars().count() as i32,
        }];
    }

    let paragraphs: Vec<&str> = section.lines().map(str::trim).filter(|p| !p.is_empty()).collect();

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0usize;
    let mut chunk_start = start_offset;

    for para in paragraphs {
        let para_size = para.chars().count();

        if para_size > max_size {
            if !current.is_empty() {
                let chunk_text = current.join("\n");
                let len = chunk_text.chars().count() as i32;
                chunks.push(TextChunk {
                    content: chunk_text,
                    index: start_index + chunks.len() as i32,
                    start_char: chunk_start,
                    end_char: chunk_start + len,
                });
                chunk_start += len + 1;
                current.clear();
                current_size = 0;
            }

            let para_chars: Vec<char> = para.chars().collect();
            let para_start = chunk_start;
            let mut i = 0usize;
            while i < para_chars.len() {
                let end = (i + max_size).min(para_chars.len());
                let piece: String = para_chars[i..end].iter().collect();
                let piece_len = piece.chars().count() as i32;
                chunks.push(TextChunk {
                    content: piece,
                    index: start_index + chunks.len() as i32,
                    start_char: para_start + i as i32,
                    end_char: para_start + i as i32 + piece_len,
                });
                i += max_size;
            }
            chunk_start = para_start + para_size as i32 + 1;
            continue;
        }

        if current_size + para_size > max_size && !current.is_empty() {
            let chunk_text = current.join("\n");
            let len = chunk_text.chars().count() as i32;
            chunks.push(TextChunk {
                content: chunk_text,
                index: start_index + chunks.len() as i32,
                start_char: chunk_start,
                end_char: chunk_start + len,
            });
            chunk_start += len + 1;
            current = vec![para];
            current_size = para_size;
        } else {
            current.push(para);
            current_size += para_size + 1;
        }
    }

    if !current.is_empty() {
        let chunk_text = current.join("\n");
        let len = chunk_text.chars().count() as i32;
        chunks.push(TextChunk {
            content: chunk_text,
            index: start_index + chunks.len() as i32,
            start_char: chunk_start,
            end_char: chunk_start + len,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_size_chunks_have_dense_indices() {
        let text = "a".repeat(1000);
        let chunks = chunk_fixed_size(&text, 100, 10, "\n");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as i32);
        }
        assert!(chunks.len() > 1);
    }

    #[test]
    fn fixed_size_makes_forward_progress() {
        let text = "x".repeat(500);
        let chunks = chunk_fixed_size(&text, 50, 49, "\n");
        assert!(!chunks.is_empty());
        let mut last_end = -1i32;
        for chunk in &chunks {
            assert!(chunk.end_char > last_end);
            last_end = chunk.end_char;
        }
    }

    #[test]
    fn fixed_size_prefers_separator_break() {
        let text = format!("{}\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = chunk_fixed_size(&text, 60, 5, "\n");
        assert!(chunks[0].content.chars().all(|c| c == 'a'));
    }

    #[test]
    fn semantic_splits_on_headings() {
        let text = "# Intro\ncontent one\n# Usage\ncontent two";
        let chunks = chunk_semantic(text, 500);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.starts_with("# Intro"));
        assert!(chunks[1].content.starts_with("# Usage"));
    }

    #[test]
    fn semantic_splits_oversized_paragraph() {
        let huge_paragraph = "word ".repeat(200);
        let chunks = chunk_semantic(&huge_paragraph, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 100);
        }
    }

    #[test]
    fn semantic_indices_are_dense_per_document() {
        let text = "# A\npara one\n\npara two\n# B\npara three";
        let chunks = chunk_semantic(text, 30);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as i32);
        }
    }
}
