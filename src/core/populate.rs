use crate::core::normalize::normalize;
use crate::core::store::ResultStore;
use crate::domain::model::TabularRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    InvalidKey(String),
    MissingFromStore,
    NoCoordinates,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRow {
    pub row: usize,
    pub raw_key: String,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulateOutcome {
    pub records: Vec<TabularRecord>,
    pub already_present: usize,
    pub filled: usize,
    pub unresolved: Vec<UnresolvedRow>,
}

impl PopulateOutcome {
    pub fn unresolved_rows(&self) -> usize {
        self.unresolved.len()
    }
}

/// 只填補缺座標的列；兩個欄位一起寫入，不會只寫一個
pub fn populate(records: &[TabularRecord], store: &ResultStore) -> PopulateOutcome {
    let mut output = Vec::with_capacity(records.len());
    let mut already_present = 0;
    let mut filled = 0;
    let mut unresolved = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let mut record = record.clone();

        if record.has_coordinates() {
            already_present += 1;
            output.push(record);
            continue;
        }

        let lookup = normalize(&record.raw_key)
            .map_err(|e| UnresolvedReason::InvalidKey(e.to_string()))
            .and_then(|key| store.get(&key).ok_or(UnresolvedReason::MissingFromStore))
            .and_then(|result| result.coordinates().ok_or(UnresolvedReason::NoCoordinates));

        match lookup {
            Ok(coordinates) => {
                record.latitude = Some(coordinates.latitude.to_string());
                record.longitude = Some(coordinates.longitude.to_string());
                filled += 1;
            }
            Err(reason) => {
                tracing::warn!(
                    "⚠️ Row {} (key '{}') has no location: {:?}",
                    row,
                    record.raw_key,
                    reason
                );
                record.latitude = None;
                record.longitude = None;
                unresolved.push(UnresolvedRow {
                    row,
                    raw_key: record.raw_key.clone(),
                    reason,
                });
            }
        }
        output.push(record);
    }

    tracing::info!(
        "🗺️ Populated {} rows ({} kept, {} filled, {} without location)",
        output.len(),
        already_present,
        filled,
        unresolved.len()
    );

    PopulateOutcome {
        records: output,
        already_present,
        filled,
        unresolved,
    }
}
