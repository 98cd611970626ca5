use crate::core::store::ResultStore;

/// 有方向的合併：`primary` 已解析者優先，否則採用 `secondary` 已解析的項目，兩邊都沒有時保留 `primary`
pub fn merge(primary: &ResultStore, secondary: &ResultStore) -> ResultStore {
    let mut merged = ResultStore::new();
    let mut filled = 0usize;

    for (key, entry) in primary.iter() {
        let chosen = match secondary.get(key) {
            Some(other) if !entry.is_resolved() && other.is_resolved() => {
                filled += 1;
                other.clone()
            }
            _ => entry.clone(),
        };
        merged.insert(key.clone(), chosen);
    }

    for (key, entry) in secondary.iter() {
        if !primary.contains(key) {
            merged.insert(key.clone(), entry.clone());
        }
    }

    tracing::info!(
        "🔀 Merged {} + {} entries into {} ({} gaps filled from secondary)",
        primary.len(),
        secondary.len(),
        merged.len(),
        filled
    );
    merged
}
