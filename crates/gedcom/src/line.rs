//! Line tokenizer: `level [@xref@] TAG [value]`.

/// One tokenized interchange line, borrowing from the decoded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub level: u8,
    /// Record id without the surrounding `@`, for lines like `0 @I12@ INDI`.
    pub xref: Option<&'a str>,
    pub tag: &'a str,
    /// Everything after the tag, trimmed. Empty when absent.
    pub value: &'a str,
}

impl<'a> Line<'a> {
    /// Tokenizes one line. Returns `None` for blank lines and lines without a
    /// numeric level or a tag.
    ///
    /// # Examples
    /// ```
    /// # use gedcom::Line;
    /// let line = Line::parse("2 _SHAR @I7@").unwrap();
    /// assert_eq!((line.level, line.tag, line.pointer()), (2, "_SHAR", Some("I7")));
    /// ```
    pub fn parse(raw: &'a str) -> Option<Self> {
        let raw = raw.trim();
        let (level, rest) = raw.split_once(' ')?;
        let level: u8 = level.parse().ok()?;
        let rest = rest.trim_start();

        let (xref, rest) = if rest.starts_with('@') {
            let (id, rest) = rest.split_once(' ')?;
            (Some(id.trim_matches('@')), rest.trim_start())
        } else {
            (None, rest)
        };

        let (tag, value) = match rest.split_once(' ') {
            Some((tag, value)) => (tag, value.trim()),
            None => (rest, ""),
        };
        if tag.is_empty() {
            return None;
        }
        Some(Self {
            level,
            xref,
            tag,
            value,
        })
    }

    /// The value as a record pointer (`@I7@` → `I7`), if it is one.
    pub fn pointer(&self) -> Option<&'a str> {
        let id = self.value.strip_prefix('@')?.strip_suffix('@')?;
        (!id.is_empty()).then_some(id)
    }
}

/// Tokenized lines of a decoded interchange text, skipping unparsable ones.
pub fn lines(text: &str) -> impl Iterator<Item = Line<'_>> {
    text.lines().filter_map(Line::parse)
}
