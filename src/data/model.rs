use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub const USERNAME: &str = "username";
pub const IS_LIVE: &str = "is_live";
pub const IS_VERIFIED: &str = "isVerified";
pub const GAME_NAME: &str = "game_name";
pub const LANGUAGE: &str = "language";
pub const TWITTER: &str = "twitter";

/// Internal document identifier, never surfaced as a column.
pub const ID_FIELD: &str = "_id";

// ---------------------------------------------------------------------------
// CellValue – a single raw cell as read from a source document
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the value kinds a document store returns.
///
/// Totally ordered (null < bool < integer < float < string, floats by
/// `total_cmp`) and hashable, so cells can key ordered sets and maps.
#[derive(Debug, Clone)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl CellValue {
    fn rank(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Bool(_) => 1,
            CellValue::Integer(_) => 2,
            CellValue::Float(_) => 3,
            CellValue::String(_) => 4,
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
            (CellValue::Integer(a), CellValue::Integer(b)) => a.cmp(b),
            (CellValue::Float(a), CellValue::Float(b)) => a.total_cmp(b),
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

/// Display form used in the table view. Export uses [`CellValue::to_field`].
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{v:.0}"),
            CellValue::Float(v) => write!(f, "{v:.2}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Text form of the value, `None` for null. Used for the typed string
    /// columns, which accept whatever scalar the source stored.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::String(s) => Some(s.clone()),
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Float(v) => Some(v.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Null => None,
        }
    }

    /// Lossless text form for CSV: floats always carry a fractional part or
    /// exponent so they are read back as floats, null is the empty field.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Float(v) => format!("{v:?}"),
            CellValue::Null => String::new(),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Metric – the fixed set of numeric columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    CurrentViewers,
    TotalStreamingMinutes,
    DailyStreamingMinutes,
    FollowersCount,
    TweetsCount,
    TotalXp,
    Views,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::CurrentViewers,
        Metric::TotalStreamingMinutes,
        Metric::DailyStreamingMinutes,
        Metric::FollowersCount,
        Metric::TweetsCount,
        Metric::TotalXp,
        Metric::Views,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::CurrentViewers => "current_viewers",
            Metric::TotalStreamingMinutes => "total_streaming_minutes",
            Metric::DailyStreamingMinutes => "daily_streaming_minutes",
            Metric::FollowersCount => "followers_count",
            Metric::TweetsCount => "tweets_count",
            Metric::TotalXp => "total_xp",
            Metric::Views => "views",
        }
    }

    pub fn from_column(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.column() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ---------------------------------------------------------------------------
// TextField – the typed string columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Username,
    IsLive,
    IsVerified,
    GameName,
    Language,
    Twitter,
}

impl TextField {
    pub const ALL: [TextField; 6] = [
        TextField::Username,
        TextField::IsLive,
        TextField::IsVerified,
        TextField::GameName,
        TextField::Language,
        TextField::Twitter,
    ];

    pub fn column(self) -> &'static str {
        match self {
            TextField::Username => USERNAME,
            TextField::IsLive => IS_LIVE,
            TextField::IsVerified => IS_VERIFIED,
            TextField::GameName => GAME_NAME,
            TextField::Language => LANGUAGE,
            TextField::Twitter => TWITTER,
        }
    }

    pub fn from_column(name: &str) -> Option<TextField> {
        TextField::ALL.into_iter().find(|t| t.column() == name)
    }
}

// ---------------------------------------------------------------------------
// RawTable – a source's documents before coercion
// ---------------------------------------------------------------------------

/// Rows as read from a source, with columns in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, CellValue>>,
}

impl RawTable {
    /// Build a table from (key, value) documents, deriving the column order
    /// from first appearance and dropping `_id`.
    pub fn from_ordered_rows(documents: Vec<Vec<(String, CellValue)>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(documents.len());
        for doc in documents {
            let mut row = BTreeMap::new();
            for (key, value) in doc {
                if key == ID_FIELD {
                    continue;
                }
                if !columns.contains(&key) {
                    columns.push(key.clone());
                }
                row.insert(key, value);
            }
            rows.push(row);
        }
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// StreamerRecord – one row of the dataset
// ---------------------------------------------------------------------------

/// One streamer's snapshot after coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamerRecord {
    pub username: Option<String>,
    pub is_live: Option<String>,
    pub is_verified: Option<String>,
    pub game_name: Option<String>,
    pub language: Option<String>,
    pub twitter: Option<String>,
    /// Indexed by [`Metric`]; zero when the column is absent or unparseable.
    metrics: [f64; 7],
    /// Every other column of the source document.
    pub extra: BTreeMap<String, CellValue>,
}

impl StreamerRecord {
    pub fn metric(&self, metric: Metric) -> f64 {
        self.metrics[metric.index()]
    }

    pub fn set_metric(&mut self, metric: Metric, value: f64) {
        self.metrics[metric.index()] = value;
    }

    pub fn text(&self, field: TextField) -> Option<&str> {
        match field {
            TextField::Username => self.username.as_deref(),
            TextField::IsLive => self.is_live.as_deref(),
            TextField::IsVerified => self.is_verified.as_deref(),
            TextField::GameName => self.game_name.as_deref(),
            TextField::Language => self.language.as_deref(),
            TextField::Twitter => self.twitter.as_deref(),
        }
    }

    pub fn set_text(&mut self, field: TextField, value: Option<String>) {
        let slot = match field {
            TextField::Username => &mut self.username,
            TextField::IsLive => &mut self.is_live,
            TextField::IsVerified => &mut self.is_verified,
            TextField::GameName => &mut self.game_name,
            TextField::Language => &mut self.language,
            TextField::Twitter => &mut self.twitter,
        };
        *slot = value;
    }

    /// Cell for an arbitrary column name, typed columns included.
    pub fn cell(&self, column: &str) -> CellValue {
        if let Some(field) = TextField::from_column(column) {
            return self
                .text(field)
                .map(|s| CellValue::String(s.to_string()))
                .unwrap_or(CellValue::Null);
        }
        if let Some(metric) = Metric::from_column(column) {
            return CellValue::Float(self.metric(metric));
        }
        self.extra.get(column).cloned().unwrap_or(CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// StreamerDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// All records of one load cycle plus the columns the source carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamerDataset {
    pub records: Vec<StreamerRecord>,
    /// Columns in order of first appearance in the source.
    pub columns: Vec<String>,
}

impl StreamerDataset {
    pub fn new(records: Vec<StreamerRecord>, columns: Vec<String>) -> Self {
        Self { records, columns }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn has_metric(&self, metric: Metric) -> bool {
        self.has_column(metric.column())
    }

    pub fn has_text(&self, field: TextField) -> bool {
        self.has_column(field.column())
    }

    /// A dataset with the same columns holding the records at `indices`,
    /// in the order given.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            records: indices
                .iter()
                .filter_map(|&i| self.records.get(i).cloned())
                .collect(),
            columns: self.columns.clone(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
