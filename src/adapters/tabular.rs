use crate::domain::model::TabularRecord;
use crate::utils::error::{GeoError, Result};

pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";

/// CSV 表格：欄位順序照原檔，缺座標欄位時補在最後
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    key_column: String,
    pub records: Vec<TabularRecord>,
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Key,
    Latitude,
    Longitude,
    Attribute,
}

impl Table {
    pub fn from_csv(data: &[u8], key_column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().from_reader(data);
        let mut headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let key_column = headers
            .iter()
            .find(|h| h.eq_ignore_ascii_case(key_column))
            .cloned()
            .ok_or_else(|| GeoError::Config {
                message: format!("column '{}' not found in input header {:?}", key_column, headers),
            })?;

        for column in [LATITUDE_COLUMN, LONGITUDE_COLUMN] {
            if !headers.iter().any(|h| h.eq_ignore_ascii_case(column)) {
                tracing::debug!("Input has no '{}' column, adding it", column);
                headers.push(column.to_string());
            }
        }

        let layout: Vec<Column> = headers.iter().map(|h| classify(h, &key_column)).collect();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut record = TabularRecord::default();
            for (index, (header, column)) in headers.iter().zip(&layout).enumerate() {
                let cell = row.get(index).map(str::to_string);
                match column {
                    Column::Key => record.raw_key = cell.unwrap_or_default(),
                    Column::Latitude => record.latitude = cell.filter(|c| !c.is_empty()),
                    Column::Longitude => record.longitude = cell.filter(|c| !c.is_empty()),
                    Column::Attribute => record
                        .attributes
                        .push((header.clone(), cell.unwrap_or_default())),
                }
            }
            records.push(record);
        }

        Ok(Self {
            headers,
            key_column,
            records,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn with_records(mut self, records: Vec<TabularRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn raw_keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.raw_key.as_str())
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;

        let layout: Vec<Column> = self
            .headers
            .iter()
            .map(|h| classify(h, &self.key_column))
            .collect();

        for record in &self.records {
            let row: Vec<&str> = self
                .headers
                .iter()
                .zip(&layout)
                .map(|(header, column)| match column {
                    Column::Key => record.raw_key.as_str(),
                    Column::Latitude => record.latitude.as_deref().unwrap_or(""),
                    Column::Longitude => record.longitude.as_deref().unwrap_or(""),
                    Column::Attribute => record
                        .attributes
                        .iter()
                        .find(|(name, _)| name == header)
                        .map(|(_, value)| value.as_str())
                        .unwrap_or(""),
                })
                .collect();
            writer.write_record(&row)?;
        }

        writer
            .into_inner()
            .map_err(|e| GeoError::Io(e.into_error()))
    }
}

fn classify(header: &str, key_column: &str) -> Column {
    if header == key_column {
        Column::Key
    } else if header.eq_ignore_ascii_case(LATITUDE_COLUMN) {
        Column::Latitude
    } else if header.eq_ignore_ascii_case(LONGITUDE_COLUMN) {
        Column::Longitude
    } else {
        Column::Attribute
    }
}
