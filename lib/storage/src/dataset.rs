use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use nextspin_core::{
    CategoricalAttr, FusionResolver, IdentityKey, NumericAttr, Record, RecordStore, SourceResponse, SourceTier,
};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

/// Separator used when a tag set is written to a single cell. Commas and
/// backslashes inside a tag are written with a leading backslash.
pub const TAG_SEPARATOR: &str = ", ";

/// A column of the working dataset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Artist,
    Title,
    ReleaseId,
    MasterId,
    Thumb,
    Tags(CategoricalAttr),
    Numeric(NumericAttr),
    /// Any column the engine does not interpret; carried through unchanged
    Extra(String),
}

impl Column {
    /// Canonical columns in file order.
    pub fn canonical() -> Vec<Column> {
        vec![
            Column::Artist,
            Column::Title,
            Column::ReleaseId,
            Column::MasterId,
            Column::Tags(CategoricalAttr::Genre),
            Column::Tags(CategoricalAttr::Style),
            Column::Tags(CategoricalAttr::Label),
            Column::Thumb,
            Column::Numeric(NumericAttr::Year),
            Column::Numeric(NumericAttr::LowestPrice),
            Column::Numeric(NumericAttr::WantCount),
            Column::Numeric(NumericAttr::HaveCount),
            Column::Numeric(NumericAttr::NumForSale),
            Column::Numeric(NumericAttr::CommunityRating),
        ]
    }

    /// Header matching is case-insensitive; unknown headers keep their
    /// original spelling.
    pub fn from_header(header: &str) -> Column {
        let name = header.trim().to_ascii_lowercase();
        match name.as_str() {
            "artist" => Column::Artist,
            "title" => Column::Title,
            "release_id" => Column::ReleaseId,
            "master_id" => Column::MasterId,
            "thumb" => Column::Thumb,
            _ => CategoricalAttr::from_name(&name)
                .map(Column::Tags)
                .or_else(|| NumericAttr::from_name(&name).map(Column::Numeric))
                .unwrap_or_else(|| Column::Extra(header.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Column::Artist => "artist",
            Column::Title => "title",
            Column::ReleaseId => "release_id",
            Column::MasterId => "master_id",
            Column::Thumb => "thumb",
            Column::Tags(attr) => attr.name(),
            Column::Numeric(attr) => attr.name(),
            Column::Extra(name) => name,
        }
    }
}

/// Counts from reading a dataset file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    /// Rows with neither artist nor title
    pub skipped: usize,
    /// Cells that held something other than a number where one was expected
    pub unparseable: usize,
}

/// The working dataset: records plus the file layout they were read from.
///
/// Reading then writing a file keeps its columns (in their original order)
/// and every value in columns the engine does not know about. Canonical
/// columns the file lacked are appended.
#[derive(Debug, Clone)]
pub struct Dataset {
    store: RecordStore,
    columns: Vec<Column>,
    extras: BTreeMap<IdentityKey, BTreeMap<String, String>>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            store: RecordStore::new(),
            columns: Column::canonical(),
            extras: BTreeMap::new(),
        }
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: RecordStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    pub fn into_store(self) -> RecordStore {
        self.store
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Value of a preserved non-canonical column for a record.
    pub fn extra(&self, key: &IdentityKey, column: &str) -> Option<&str> {
        self.extras.get(key)?.get(column).map(String::as_str)
    }

    /// Read a dataset file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|| format!("failed to open dataset {}", path.display()))?;
        let (dataset, stats) =
            Self::from_reader(file).with_context(|| format!("failed to read dataset {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            records = dataset.store.len(),
            rows = stats.rows,
            skipped = stats.skipped,
            unparseable = stats.unparseable,
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Read a dataset file, or start an empty one if it does not exist yet.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no dataset yet, starting empty");
            Ok(Self::new())
        }
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<(Self, LoadStats)> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let layout: Vec<Column> = csv
            .headers()
            .context("missing header row")?
            .iter()
            .map(Column::from_header)
            .collect();
        let mut columns: Vec<Column> = Vec::with_capacity(layout.len());
        for column in &layout {
            // a repeated header keeps its first position
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }

        let mut dataset = Self {
            store: RecordStore::new(),
            columns,
            extras: BTreeMap::new(),
        };
        let mut stats = LoadStats::default();
        let resolver = FusionResolver::new();

        for (line, row) in csv.records().enumerate() {
            let row = row.with_context(|| format!("malformed row {}", line + 2))?;
            stats.rows += 1;

            let mut parsed = Row::default();
            for (column, cell) in layout.iter().zip(row.iter()) {
                parsed.set(column, cell, line + 2, &mut stats);
            }

            if parsed.artist.is_empty() && parsed.title.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let key = IdentityKey::new(&parsed.artist, &parsed.title);
            let fused = resolver.fuse(
                &parsed.artist,
                &parsed.title,
                dataset.store.get(&key),
                std::slice::from_ref(&parsed.response),
            );
            match fused {
                Some(record) => {
                    dataset.store.upsert(record);
                }
                None if !dataset.store.contains(&key) => {
                    dataset.store.upsert(Record::new(&parsed.artist, &parsed.title));
                }
                None => {}
            }
            if !parsed.extras.is_empty() {
                // later rows win for duplicate keys, matching the fusion order
                dataset.extras.entry(key).or_default().extend(parsed.extras);
            }
        }

        for column in Column::canonical() {
            if !dataset.columns.contains(&column) {
                dataset.columns.push(column);
            }
        }
        Ok((dataset, stats))
    }

    /// Write to `path` through a temporary file that is renamed over the
    /// target, so readers never see a partial file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|file| self.write_to(file))
            .with_context(|| format!("failed to write dataset {}", path.display()))?;
        tracing::info!(path = %path.display(), records = self.store.len(), "dataset saved");
        Ok(())
    }

    pub fn write_to<W: io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.columns.iter().map(Column::name))?;
        for record in self.store.iter() {
            let extras = self.extras.get(&record.key);
            let row: Vec<String> = self
                .columns
                .iter()
                .map(|column| cell(record, column, extras))
                .collect();
            csv.write_record(&row)?;
        }
        csv.flush()?;
        Ok(())
    }
}

/// One parsed row before it is fused into the store.
struct Row {
    artist: String,
    title: String,
    response: SourceResponse,
    extras: BTreeMap<String, String>,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            artist: String::new(),
            title: String::new(),
            response: SourceResponse::new(SourceTier::Cached),
            extras: BTreeMap::new(),
        }
    }
}

impl Row {
    fn set(&mut self, column: &Column, cell: &str, line: usize, stats: &mut LoadStats) {
        match column {
            Column::Artist => self.artist = cell.to_string(),
            Column::Title => self.title = cell.to_string(),
            Column::Extra(name) => {
                self.extras.insert(name.clone(), cell.to_string());
            }
            _ if cell.is_empty() => {}
            Column::ReleaseId | Column::MasterId => match parse_id(cell) {
                Some(id) if *column == Column::ReleaseId => self.response.release_id = Some(id),
                Some(id) => self.response.master_id = Some(id),
                None => {
                    stats.unparseable += 1;
                    tracing::warn!(line, column = column.name(), value = cell, "unparseable id, treating as missing");
                }
            },
            Column::Thumb => self.response.thumb = Some(cell.to_string()),
            Column::Tags(attr) => {
                let tags = split_tags(cell);
                if !tags.is_empty() {
                    self.response.tags.insert(*attr, tags);
                }
            }
            Column::Numeric(attr) => match cell.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    self.response.numeric.insert(*attr, value);
                }
                _ => {
                    stats.unparseable += 1;
                    tracing::warn!(line, column = attr.name(), value = cell, "unparseable number, treating as missing");
                }
            },
        }
    }
}

fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter()
        .map(|tag| tag.replace('\\', "\\\\").replace(',', "\\,"))
        .collect::<Vec<_>>()
        .join(TAG_SEPARATOR)
}

/// Split a tag cell on unescaped commas.
fn split_tags(cell: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    let mut current = String::new();
    let mut chars = cell.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().unwrap_or('\\')),
            ',' => push_tag(&mut tags, &mut current),
            c => current.push(c),
        }
    }
    push_tag(&mut tags, &mut current);
    tags
}

fn push_tag(tags: &mut BTreeSet<String>, current: &mut String) {
    let tag = current.trim();
    if !tag.is_empty() {
        tags.insert(tag.to_string());
    }
    current.clear();
}

/// Ids may have been written as floats (`"1234.0"`) by other tools.
fn parse_id(cell: &str) -> Option<u64> {
    if let Ok(id) = cell.parse::<u64>() {
        return Some(id).filter(|&id| id > 0);
    }
    let value = cell.parse::<f64>().ok()?;
    (value.is_finite() && value >= 1.0 && value.fract() == 0.0 && value <= u64::MAX as f64).then_some(value as u64)
}

fn cell(record: &Record, column: &Column, extras: Option<&BTreeMap<String, String>>) -> String {
    match column {
        Column::Artist => record.artist.clone(),
        Column::Title => record.title.clone(),
        Column::ReleaseId => record.release_id.map(|id| id.to_string()).unwrap_or_default(),
        Column::MasterId => record.master_id.map(|id| id.to_string()).unwrap_or_default(),
        Column::Thumb => record.thumb.clone().unwrap_or_default(),
        Column::Tags(attr) => join_tags(record.tags(*attr)),
        Column::Numeric(attr) => record.numeric(*attr).map(|v| v.to_string()).unwrap_or_default(),
        Column::Extra(name) => extras
            .and_then(|extras| extras.get(name))
            .cloned()
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
Artist,Title,Genre,Year,Lowest_Price,want_count,have_count,notes
Miles Davis,Kind of Blue,\"Jazz, Modal\",1959,20,10,,first press
John Coltrane,Blue Train,Jazz,abc,,5,3,
,,Rock,1970,,,,
miles davis,KIND OF BLUE,,,,12,40,reissue
";

    fn sample() -> (Dataset, LoadStats) {
        Dataset::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_reads_case_insensitive_headers() {
        let (dataset, stats) = sample();
        assert_eq!(stats.rows, 4);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.unparseable, 1);
        assert_eq!(dataset.store().len(), 2);

        let coltrane = dataset.store().get(&IdentityKey::new("John Coltrane", "Blue Train")).unwrap();
        assert_eq!(coltrane.numeric(NumericAttr::Year), None);
        assert_eq!(coltrane.numeric(NumericAttr::LowestPrice), None);
        assert_eq!(coltrane.numeric(NumericAttr::HaveCount), Some(3.0));
    }

    #[test]
    fn test_duplicate_rows_are_fused() {
        let (dataset, _) = sample();
        let miles = dataset.store().get(&IdentityKey::new("Miles Davis", "Kind of Blue")).unwrap();
        // later row is fresher, but its empty cells do not erase anything
        assert_eq!(miles.numeric(NumericAttr::WantCount), Some(12.0));
        assert_eq!(miles.numeric(NumericAttr::HaveCount), Some(40.0));
        assert_eq!(miles.numeric(NumericAttr::LowestPrice), Some(20.0));
        assert_eq!(miles.numeric(NumericAttr::Year), Some(1959.0));
        assert_eq!(miles.tags(CategoricalAttr::Genre).len(), 2);
        assert_eq!(miles.artist, "Miles Davis");
        assert_eq!(
            dataset.extra(&miles.key, "notes"),
            Some("reissue")
        );
    }

    #[test]
    fn test_write_keeps_extras_and_appends_missing_columns() {
        let (dataset, _) = sample();
        let mut out = Vec::new();
        dataset.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let header = text.lines().next().unwrap();

        assert!(header.starts_with("artist,title,genre,year,lowest_price,want_count,have_count,notes"));
        assert!(header.ends_with("community_rating"));
        assert!(header.contains("release_id"));
        assert!(text.contains("\"Jazz, Modal\""));
        assert!(text.contains("reissue"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("records.csv");
        let (dataset, _) = sample();
        dataset.save(&path).unwrap();

        let reloaded = Dataset::load(&path).unwrap();
        assert_eq!(reloaded.store().len(), dataset.store().len());
        for (a, b) in reloaded.store().iter().zip(dataset.store().iter()) {
            assert_eq!(a.key, b.key);
            assert_eq!(a.numeric, b.numeric);
            assert_eq!(a.tags, b.tags);
        }
        assert_eq!(reloaded.columns(), dataset.columns());
    }

    #[test]
    fn test_tags_with_commas_survive_reload() {
        let (mut dataset, _) = sample();
        let record = Record::new("Earth, Wind & Fire", "That's the Way of the World")
            .with_tags(CategoricalAttr::Label, ["Earth, Wind & Fire", "Columbia", "back\\slash"]);
        let key = record.key.clone();
        dataset.store_mut().upsert(record);

        let mut out = Vec::new();
        dataset.write_to(&mut out).unwrap();
        let (reloaded, _) = Dataset::from_reader(out.as_slice()).unwrap();
        let labels = reloaded.store().get(&key).unwrap().tags(CategoricalAttr::Label);
        assert_eq!(labels.len(), 3);
        assert!(labels.contains("Earth, Wind & Fire"));
        assert!(labels.contains("back\\slash"));

        let miles = reloaded.store().get(&IdentityKey::new("Miles Davis", "Kind of Blue")).unwrap();
        assert_eq!(miles.tags(CategoricalAttr::Genre).len(), 2);
    }

    #[test]
    fn test_split_tags() {
        let tags = split_tags(r"Jazz,  Modal , ,Earth\, Wind & Fire,trailing\");
        let expected: BTreeSet<String> = ["Jazz", "Modal", "Earth, Wind & Fire", "trailing\\"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.csv");
        std::fs::write(&path, "artist,title\nA,B\nC,D\n").unwrap();

        let mut dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.store().len(), 2);
        dataset
            .store_mut()
            .upsert(Record::new("E", "F").with_numeric(NumericAttr::WantCount, 4.0));
        dataset.save(&path).unwrap();

        let reloaded = Dataset::load(&path).unwrap();
        assert_eq!(reloaded.store().len(), 3);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(Dataset::load(&path).is_err());
        let empty = Dataset::load_or_default(&path).unwrap();
        assert!(empty.store().is_empty());
        assert_eq!(empty.columns().len(), Column::canonical().len());
    }

    #[test]
    fn test_float_ids_and_partial_identity() {
        let input = "artist,title,release_id,master_id\nAphex Twin,,1234.0,x\n";
        let (dataset, stats) = Dataset::from_reader(input.as_bytes()).unwrap();
        assert_eq!(stats.unparseable, 1);
        let record = dataset.store().iter().next().unwrap();
        assert_eq!(record.release_id, Some(1234));
        assert_eq!(record.master_id, None);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), Some(42));
        assert_eq!(parse_id("42.0"), Some(42));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("4.5"), None);
        assert_eq!(parse_id("-3"), None);
    }
}
