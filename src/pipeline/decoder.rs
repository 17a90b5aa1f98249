//! Incremental JSON object recovery from a generation stream.
//!
//! Generation backends return text in arbitrary chunks, and models wrap
//! their JSON in prose, code fences, or trailing commentary no matter how
//! firmly the prompt forbids it. This decoder scans the chunk sequence
//! with an explicit state machine (brace depth, in-string flag, escape
//! flag) and yields each object the instant its closing brace lands,
//! discarding everything between objects.
//!
//! One decoder instance serves exactly one generation call.

use super::ExtractionError;

/// Stateful scanner over one generation call's chunk sequence.
///
/// Feed chunks with [`feed`](Self::feed); every syntactically complete
/// object is returned as soon as it closes. Call
/// [`finish`](Self::finish) at end-of-stream to surface an unterminated
/// trailing object.
pub struct StreamDecoder {
    /// Bytes of the object currently being assembled. Empty while the
    /// scanner sits between objects.
    current: String,
    /// Brace nesting depth; 0 means outside any object.
    depth: u32,
    /// Scanner position is inside a quoted string literal.
    in_string: bool,
    /// Previous char was a backslash inside a string.
    escaped: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            current: String::new(),
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Consume the next chunk. Returns one entry per candidate object
    /// completed by this chunk, in encounter order: `Ok` with the parsed
    /// value, or `Err` for a balanced-but-invalid candidate (the caller
    /// may skip it and keep decoding).
    pub fn feed(&mut self, fragment: &str) -> Vec<Result<serde_json::Value, ExtractionError>> {
        let mut completed = Vec::new();

        for ch in fragment.chars() {
            if self.depth == 0 {
                // Between objects: everything except an opening brace is
                // wrapper filler (prose, fences) and is discarded.
                if ch == '{' {
                    self.current.clear();
                    self.current.push(ch);
                    self.depth = 1;
                    self.in_string = false;
                    self.escaped = false;
                }
                continue;
            }

            self.current.push(ch);

            if self.escaped {
                self.escaped = false;
                continue;
            }
            if self.in_string {
                match ch {
                    '\\' => self.escaped = true,
                    '"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match ch {
                '"' => self.in_string = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        completed.push(self.take_candidate());
                    }
                }
                _ => {}
            }
        }

        completed
    }

    /// Signal end-of-stream. Fails when the stream stopped inside an
    /// object, the hallmark of a truncated generation.
    pub fn finish(self) -> Result<(), ExtractionError> {
        if self.depth > 0 {
            return Err(ExtractionError::UnterminatedObject { depth: self.depth });
        }
        Ok(())
    }

    fn take_candidate(&mut self) -> Result<serde_json::Value, ExtractionError> {
        let raw = std::mem::take(&mut self.current);
        serde_json::from_str(&raw).map_err(|e| ExtractionError::InvalidJson(e.to_string()))
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Feed the whole input and collect only the valid objects.
    fn decode_all(input: &str) -> Vec<serde_json::Value> {
        let mut decoder = StreamDecoder::new();
        decoder
            .feed(input)
            .into_iter()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn whole_object_in_one_feed() {
        let objects = decode_all(r#"{"a":1}"#);
        assert_eq!(objects, vec![json!({"a": 1})]);
    }

    #[test]
    fn split_at_every_boundary_matches_whole_feed() {
        let input = r#"{"a":1}"#;
        let expected = decode_all(input);

        for split in 1..input.len() {
            let mut decoder = StreamDecoder::new();
            let mut objects = Vec::new();
            objects.extend(decoder.feed(&input[..split]).into_iter().filter_map(|r| r.ok()));
            objects.extend(decoder.feed(&input[split..]).into_iter().filter_map(|r| r.ok()));
            decoder.finish().unwrap();
            assert_eq!(objects, expected, "split at byte {split}");
        }
    }

    #[test]
    fn brace_inside_string_does_not_close() {
        let objects = decode_all(r#"{"a":"}"}"#);
        assert_eq!(objects, vec![json!({"a": "}"})]);
    }

    #[test]
    fn escaped_quote_inside_string() {
        let objects = decode_all(r#"{"a":"she said \"hi\" {...}"}"#);
        assert_eq!(objects, vec![json!({"a": "she said \"hi\" {...}"})]);
    }

    #[test]
    fn leading_prose_and_fence_discarded() {
        let input = "Sure, here is the JSON you asked for:\n```json\n{\"x\":1}\n```\n";
        let objects = decode_all(input);
        assert_eq!(objects, vec![json!({"x": 1})]);
    }

    #[test]
    fn filler_between_objects_discarded() {
        let input = r#"{"a":1} and now the second one {"b":2}"#;
        let objects = decode_all(input);
        assert_eq!(objects, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn back_to_back_siblings_emit_in_order_from_one_feed() {
        let mut decoder = StreamDecoder::new();
        let results = decoder.feed(r#"{"first":1}{"second":2}"#);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &json!({"first": 1}));
        assert_eq!(results[1].as_ref().unwrap(), &json!({"second": 2}));
    }

    #[test]
    fn nested_object_is_one_emission() {
        let objects = decode_all(r#"{"outer":{"inner":{"deep":true}}}"#);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["outer"]["inner"]["deep"], json!(true));
    }

    #[test]
    fn empty_fragments_are_noops() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed("").is_empty());
        decoder.feed(r#"{"a":"#);
        assert!(decoder.feed("").is_empty());
        let results = decoder.feed("1}");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn balanced_but_invalid_candidate_is_an_err_item() {
        let mut decoder = StreamDecoder::new();
        let results = decoder.feed(r#"{invalid} {"ok":true}"#);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(ExtractionError::InvalidJson(_))));
        assert_eq!(results[1].as_ref().unwrap(), &json!({"ok": true}));
        decoder.finish().unwrap();
    }

    #[test]
    fn finish_fails_on_unterminated_object() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(r#"{"a": {"b":"#);
        let err = decoder.finish().unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::UnterminatedObject { depth: 2 }
        ));
    }

    #[test]
    fn finish_succeeds_with_trailing_filler() {
        let mut decoder = StreamDecoder::new();
        decoder.feed("{\"a\":1}\n```\nthat's all!");
        decoder.finish().unwrap();
    }

    #[test]
    fn split_inside_escape_sequence() {
        let mut decoder = StreamDecoder::new();
        // Split right between the backslash and the escaped quote.
        assert!(decoder.feed(r#"{"a":"x\"#).iter().all(|r| r.is_ok()));
        let results = decoder.feed(r#""y"}"#);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &json!({"a": "x\"y"}));
    }

    #[test]
    fn unicode_content_passes_through() {
        let objects = decode_all(r#"{"summary":"含有暴力镜头 — brève"}"#);
        assert_eq!(objects[0]["summary"], json!("含有暴力镜头 — brève"));
    }
}
