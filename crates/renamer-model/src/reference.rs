//! Recognizing sheet-qualified references (`Sheet1!A1`, `'My Sheet'!A1`) inside formula text.

use std::ops::Range;

use regex::Regex;

/// A compiled recognizer for a fixed set of sheet names used as formula references.
///
/// A reference is one of the names immediately followed by `!`, optionally preceded and/or
/// followed by a single straight quote. Matching is exact (case-sensitive) and leftmost-first.
///
/// Names are tried longest first, so when one name is a prefix of another (`Q1` and `Q1 Data`)
/// the longer name wins at a given position.
#[derive(Clone, Debug)]
pub struct SheetReferenceMatcher {
    regex: Option<Regex>,
}

/// One sheet reference found in a formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetReference<'f> {
    /// The referenced sheet name without quotes.
    pub name: &'f str,
    /// Byte span of the whole reference, including any quotes and the trailing `!`.
    pub span: Range<usize>,
}

impl SheetReferenceMatcher {
    /// Build a matcher for `names`. Empty names are ignored; with no names left the matcher never
    /// matches.
    pub fn compile<I, S>(names: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(Self { regex: None });
        }

        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        let alternation = names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!("'?(?P<name>{alternation})'?!"))?;
        Ok(Self { regex: Some(regex) })
    }

    /// Iterate the non-overlapping references in `formula`, left to right.
    pub fn find_iter<'m, 'f>(
        &'m self,
        formula: &'f str,
    ) -> impl Iterator<Item = SheetReference<'f>> + 'm
    where
        'f: 'm,
    {
        self.regex
            .iter()
            .flat_map(move |regex| regex.captures_iter(formula))
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps.name("name")?;
                Some(SheetReference {
                    name: name.as_str(),
                    span: whole.range(),
                })
            })
    }

    /// Returns `true` if `formula` contains at least one reference.
    pub fn is_match(&self, formula: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(formula))
    }

    pub(crate) fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }
}
