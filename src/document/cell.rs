use std::fmt;

/// Largest column index (`ZZ`).
pub const MAX_COLUMNS: u32 = 26 * 27;
/// Largest row number.
pub const MAX_ROWS: u32 = 16384;

/// A spreadsheet cell address such as `B12` or `$A$1`.
///
/// Rows and columns are zero based internally; `$` marks an absolute
/// coordinate that offset rewrites leave alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Zero based row.
    pub row:          u32,
    /// Zero based column.
    pub col:          u32,
    /// `$` before the row.
    pub absolute_row: bool,
    /// `$` before the column.
    pub absolute_col: bool,
}

impl CellAddress {
    /// Creates a relative address.
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row,
               col,
               absolute_row: false,
               absolute_col: false }
    }

    /// Parses `A1`, `$A1`, `A$1` or `$A$1`.
    ///
    /// # Example
    /// ```
    /// use cadexpr::document::cell::CellAddress;
    ///
    /// let a = CellAddress::parse("$B12").unwrap();
    /// assert_eq!((a.row, a.col, a.absolute_col, a.absolute_row), (11, 1, true, false));
    /// assert_eq!(a.to_string(), "$B12");
    /// assert!(CellAddress::parse("Length").is_none());
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut chars = text.char_indices().peekable();
        let absolute_col = chars.next_if(|(_, c)| *c == '$').is_some();

        let mut col: u32 = 0;
        let mut letters = 0;
        while let Some((_, c)) = chars.next_if(|(_, c)| c.is_ascii_uppercase()) {
            col = col * 26 + (u32::from(c) - u32::from('A') + 1);
            letters += 1;
        }
        if letters == 0 || letters > 2 {
            return None;
        }

        let absolute_row = chars.next_if(|(_, c)| *c == '$').is_some();
        let start = chars.peek().map(|(i, _)| *i)?;
        let digits = &text[start..];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || digits.starts_with('0')
        {
            return None;
        }
        let row: u32 = digits.parse().ok()?;
        if row > MAX_ROWS || col > MAX_COLUMNS {
            return None;
        }
        Some(Self { row: row - 1,
                    col: col - 1,
                    absolute_row,
                    absolute_col })
    }

    /// The address moved by `rows` and `cols`, or `None` when it would leave
    /// the sheet.
    #[must_use]
    pub fn offset(&self, rows: i64, cols: i64) -> Option<Self> {
        let row = i64::from(self.row) + rows;
        let col = i64::from(self.col) + cols;
        if row < 0 || col < 0 || row >= i64::from(MAX_ROWS) || col >= i64::from(MAX_COLUMNS) {
            return None;
        }
        Some(Self { row: u32::try_from(row).ok()?,
                    col: u32::try_from(col).ok()?,
                    ..*self })
    }

    /// All addresses of the rectangle spanned by `self` and `end`, row-major.
    ///
    /// # Example
    /// ```
    /// use cadexpr::document::cell::CellAddress;
    ///
    /// let a = CellAddress::parse("A1").unwrap();
    /// let b = CellAddress::parse("B2").unwrap();
    /// let cells: Vec<String> = a.range_to(&b).iter().map(ToString::to_string).collect();
    /// assert_eq!(cells, ["A1", "B1", "A2", "B2"]);
    /// ```
    #[must_use]
    pub fn range_to(&self, end: &Self) -> Vec<Self> {
        let (r0, r1) = (self.row.min(end.row), self.row.max(end.row));
        let (c0, c1) = (self.col.min(end.col), self.col.max(end.col));
        (r0..=r1).flat_map(|row| (c0..=c1).map(move |col| Self::new(row, col)))
                 .collect()
    }

    fn column_name(&self) -> String {
        let col = self.col + 1;
        if col <= 26 {
            char::from_u32(u32::from('A') + col - 1).map_or_else(String::new, String::from)
        } else {
            let first = (col - 1) / 26;
            let second = (col - 1) % 26;
            [first - 1 + u32::from('A'), second + u32::from('A')].iter()
                                                                .filter_map(|c| char::from_u32(*c))
                                                                .collect()
        }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute_col {
            f.write_str("$")?;
        }
        f.write_str(&self.column_name())?;
        if self.absolute_row {
            f.write_str("$")?;
        }
        write!(f, "{}", self.row + 1)
    }
}

/// Expands `begin:end` into its cells.
///
/// Either end may be an alias, looked up with `alias`. Returns `None` when an
/// end is neither an address nor a known alias.
///
/// # Example
/// ```
/// use cadexpr::document::cell::expand_range;
///
/// let cells = expand_range("A1", "width", |a| (a == "width").then(|| "A3".to_string())).unwrap();
/// assert_eq!(cells.len(), 3);
/// assert!(expand_range("A1", "nope", |_| None).is_none());
/// ```
pub fn expand_range(begin: &str,
                    end: &str,
                    alias: impl Fn(&str) -> Option<String>)
                    -> Option<Vec<CellAddress>> {
    let lookup = |text: &str| {
        CellAddress::parse(text).or_else(|| alias(text).and_then(|a| CellAddress::parse(&a)))
    };
    Some(lookup(begin)?.range_to(&lookup(end)?))
}
