//! Sentence-aware chunking of filing text.

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 20,
        }
    }
}

/// Splits text into chunks of roughly `chunk_size` characters on sentence
/// boundaries, carrying `chunk_overlap` characters of trailing sentences
/// into the next chunk. Deterministic for a given input and config.
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let sentences = split_sentences(text);
        merge_sentences(&sentences, self.config.chunk_size, self.config.chunk_overlap)
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        current.push(chars[i]);

        // Paragraph break
        if chars[i] == '\n' && i + 1 < chars.len() && chars[i + 1] == '\n' {
            current.push(chars[i + 1]);
            i += 1;
            if !current.trim().is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
        }
        // Sentence ending followed by a space
        else if (chars[i] == '.' || chars[i] == '?' || chars[i] == '!')
            && i + 1 < chars.len()
            && chars[i + 1] == ' '
            && !current.trim().is_empty()
        {
            sentences.push(std::mem::take(&mut current));
        }

        i += 1;
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}

fn merge_sentences(sentences: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut window_start = 0;

    for (idx, sentence) in sentences.iter().enumerate() {
        if !current.is_empty() && current.len() + sentence.len() > chunk_size {
            chunks.push(current.clone());

            // Rebuild the start of the next chunk from trailing sentences
            // that fit within the overlap budget.
            current.clear();
            let mut overlap_len = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                if overlap_len + sentences[i].len() > chunk_overlap {
                    break;
                }
                overlap_len += sentences[i].len();
                overlap_start = i;
            }
            for s in &sentences[overlap_start..idx] {
                current.push_str(s);
            }
            window_start = overlap_start;
        }

        current.push_str(sentence);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(TextSplitter::default().split("").is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = TextSplitter::default().split("Revenue grew 10%.");
        assert_eq!(chunks, vec!["Revenue grew 10%."]);
    }

    #[test]
    fn long_text_splits_on_sentences() {
        let text = "First sentence. Second sentence. Third sentence.";
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: 20,
            chunk_overlap: 5,
        });
        let chunks = splitter.split(text);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn paragraph_break_splits() {
        let sentences = split_sentences("First paragraph.\n\nSecond paragraph.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn question_and_exclamation_split() {
        assert_eq!(split_sentences("Is it up? Yes!").len(), 2);
        assert_eq!(split_sentences("Wow! Amazing.").len(), 2);
    }

    #[test]
    fn no_trailing_delimiter_is_one_sentence() {
        let sentences = split_sentences("no delimiter here");
        assert_eq!(sentences, vec!["no delimiter here"]);
    }

    #[test]
    fn overlap_carries_trailing_sentence() {
        let text = "Aaaa. Bbbb. Cccc. Dddd. Eeee.";
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: 12,
            chunk_overlap: 6,
        });
        let chunks = splitter.split(text);
        assert!(chunks.len() > 1);
        // The second chunk re-starts with the tail of the first.
        assert!(chunks[1].starts_with(chunks[0].rsplit(' ').next().unwrap_or_default()));
    }

    mod proptest_splitter {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn split_never_panics(
                text in "\\PC{0,3000}",
                chunk_size in 1usize..1000,
                chunk_overlap in 0usize..200,
            ) {
                let splitter = TextSplitter::new(SplitterConfig { chunk_size, chunk_overlap });
                let _ = splitter.split(&text);
            }

            #[test]
            fn split_is_deterministic(
                text in "[a-z. !?]{0,1000}",
                chunk_size in 1usize..500,
                chunk_overlap in 0usize..100,
            ) {
                let splitter = TextSplitter::new(SplitterConfig { chunk_size, chunk_overlap });
                prop_assert_eq!(splitter.split(&text), splitter.split(&text));
            }

            #[test]
            fn chunks_cover_all_content(
                text in "[a-z. ]{10,500}",
                chunk_size in 10usize..200,
            ) {
                let splitter = TextSplitter::new(SplitterConfig { chunk_size, chunk_overlap: 0 });
                let chunks = splitter.split(&text);
                let total: usize = chunks.iter().map(String::len).sum();
                prop_assert!(total >= text.trim_end().len());
            }

            #[test]
            fn no_empty_chunks(
                text in "[a-z. !?]{1,500}",
                chunk_size in 1usize..200,
                chunk_overlap in 0usize..50,
            ) {
                let splitter = TextSplitter::new(SplitterConfig { chunk_size, chunk_overlap });
                for chunk in splitter.split(&text) {
                    prop_assert!(!chunk.is_empty());
                }
            }
        }
    }
}
