//! CSV persistence of enriched stations.
//!
//! Files are written with polars in a blocking task, one row per station, with
//! the KMA column names followed by the address columns:
//!
//! `STN_ID,LON,LAT,STN_SP,HT,HT_PA,HT_TA,HT_WD,HT_RN,STN_CD,STN_KO,STN_EN,FCT_ID,LAW_ID,BASIN,SIDO_NM,SGG_NM,EMDONG_NM,FULL_ADDR`

use crate::storage::error::StorageError;
use crate::types::address::Address;
use crate::types::station::{EnrichedStation, Heights, Location, Station};
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::task;

pub const COLUMNS: [&str; 19] = [
    "STN_ID", "LON", "LAT", "STN_SP", "HT", "HT_PA", "HT_TA", "HT_WD", "HT_RN", "STN_CD",
    "STN_KO", "STN_EN", "FCT_ID", "LAW_ID", "BASIN", "SIDO_NM", "SGG_NM", "EMDONG_NM",
    "FULL_ADDR",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// File name used for the enriched station list valid at `tm`.
pub fn default_file_name(tm: &str) -> String {
    format!("enriched_weather_stations_{}.csv", tm)
}

/// Writes `rows` to `path`, creating parent directories as needed.
///
/// With `include_bom` the file starts with a UTF-8 byte order mark so that
/// spreadsheet tools pick the right encoding for the Korean columns.
pub async fn write_csv(
    path: &Path,
    rows: &[EnrichedStation],
    include_bom: bool,
) -> Result<(), StorageError> {
    let mut df = stations_to_dataframe(rows)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::Io(parent.to_path_buf(), e))?;
    }

    let path_buf = path.to_path_buf();
    task::spawn_blocking(move || {
        let mut file = std::fs::File::create(&path_buf)
            .map_err(|e| StorageError::Io(path_buf.clone(), e))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .include_bom(include_bom)
            .finish(&mut df)
            .map_err(|e| StorageError::CsvWrite(path_buf, e))
    })
    .await??;
    Ok(())
}

/// Reads a file produced by [`write_csv`] back into enriched stations.
pub async fn read_csv(path: &Path) -> Result<Vec<EnrichedStation>, StorageError> {
    let mut bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StorageError::Io(path.to_path_buf(), e))?;
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }

    let path_buf = path.to_path_buf();
    task::spawn_blocking(move || {
        // No schema inference: every column comes back as a string and is parsed below.
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| StorageError::CsvRead(path_buf.clone(), e))?;
        dataframe_to_stations(&df, &path_buf)
    })
    .await?
}

fn stations_to_dataframe(rows: &[EnrichedStation]) -> Result<DataFrame, StorageError> {
    let ids: Vec<u32> = rows.iter().map(|r| r.station.id).collect();
    let columns = vec![
        Column::new(COLUMNS[0].into(), ids),
        number_column(COLUMNS[1], rows, |r| r.station.location.longitude),
        number_column(COLUMNS[2], rows, |r| r.station.location.latitude),
        text_column(COLUMNS[3], rows, |r| &r.station.station_type),
        number_column(COLUMNS[4], rows, |r| r.station.heights.ground),
        number_column(COLUMNS[5], rows, |r| r.station.heights.barometer),
        number_column(COLUMNS[6], rows, |r| r.station.heights.thermometer),
        number_column(COLUMNS[7], rows, |r| r.station.heights.anemometer),
        number_column(COLUMNS[8], rows, |r| r.station.heights.rain_gauge),
        text_column(COLUMNS[9], rows, |r| &r.station.code),
        text_column(COLUMNS[10], rows, |r| &r.station.name_ko),
        text_column(COLUMNS[11], rows, |r| &r.station.name_en),
        text_column(COLUMNS[12], rows, |r| &r.station.forecast_zone),
        text_column(COLUMNS[13], rows, |r| &r.station.legal_dong),
        text_column(COLUMNS[14], rows, |r| &r.station.basin),
        text_column(COLUMNS[15], rows, |r| &r.address.sido),
        text_column(COLUMNS[16], rows, |r| &r.address.sigungu),
        text_column(COLUMNS[17], rows, |r| &r.address.eupmyeondong),
        text_column(COLUMNS[18], rows, |r| &r.address.full_address),
    ];
    DataFrame::new(columns).map_err(StorageError::FrameBuild)
}

fn text_column(
    name: &str,
    rows: &[EnrichedStation],
    value: impl Fn(&EnrichedStation) -> &str,
) -> Column {
    let values: Vec<&str> = rows.iter().map(value).collect();
    Column::new(name.into(), values)
}

fn number_column(
    name: &str,
    rows: &[EnrichedStation],
    value: impl Fn(&EnrichedStation) -> f64,
) -> Column {
    let values: Vec<f64> = rows.iter().map(value).collect();
    Column::new(name.into(), values)
}

fn dataframe_to_stations(df: &DataFrame, path: &Path) -> Result<Vec<EnrichedStation>, StorageError> {
    let mut columns: Vec<Vec<String>> = Vec::with_capacity(COLUMNS.len());
    for name in COLUMNS {
        let missing = |source: PolarsError| StorageError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
            source,
        };
        let values = df
            .column(name)
            .map_err(missing)?
            .as_materialized_series()
            .str()
            .map_err(missing)?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect();
        columns.push(values);
    }

    let mut rows = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let field = |i: usize| columns[i][row].clone();
        let invalid = |i: usize| StorageError::InvalidValue {
            path: path.to_path_buf(),
            row: row + 1,
            column: COLUMNS[i],
            value: columns[i][row].clone(),
        };
        let number = |i: usize| columns[i][row].trim().parse::<f64>().map_err(|_| invalid(i));

        let station = Station {
            id: columns[0][row].trim().parse().map_err(|_| invalid(0))?,
            location: Location::new(number(1)?, number(2)?),
            station_type: field(3),
            heights: Heights {
                ground: number(4)?,
                barometer: number(5)?,
                thermometer: number(6)?,
                anemometer: number(7)?,
                rain_gauge: number(8)?,
            },
            code: field(9),
            name_ko: field(10),
            name_en: field(11),
            forecast_zone: field(12),
            legal_dong: field(13),
            basin: field(14),
        };
        let address = Address {
            sido: field(15),
            sigungu: field(16),
            eupmyeondong: field(17),
            full_address: field(18),
        };
        rows.push(EnrichedStation::new(station, address));
    }
    Ok(rows)
}

/// Joins `dir` and the default file name for `tm`.
pub fn default_path(dir: &Path, tm: &str) -> PathBuf {
    dir.join(default_file_name(tm))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: u32, lon: f64, lat: f64, name_ko: &str, name_en: &str) -> Station {
        Station {
            id,
            location: Location::new(lon, lat),
            station_type: "1".to_string(),
            heights: Heights {
                ground: 85.67,
                barometer: 87.17,
                thermometer: 1.5,
                anemometer: 10.0,
                rain_gauge: 0.8,
            },
            code: format!("47{:03}", id),
            name_ko: name_ko.to_string(),
            name_en: name_en.to_string(),
            forecast_zone: "11B10101".to_string(),
            legal_dong: "1111011500".to_string(),
            basin: "10190".to_string(),
        }
    }

    fn sample_rows() -> Vec<EnrichedStation> {
        vec![
            EnrichedStation::new(
                station(108, 126.9658, 37.57142, "서울", "Seoul"),
                Address {
                    sido: "서울특별시".to_string(),
                    sigungu: "종로구".to_string(),
                    eupmyeondong: "송월동".to_string(),
                    full_address: "서울특별시 종로구 송월길 52".to_string(),
                },
            ),
            EnrichedStation::new(
                station(185, 126.162, 33.29382, "고산", "Jeju Gosan"),
                Address {
                    sido: "제주특별자치도".to_string(),
                    sigungu: "제주시".to_string(),
                    eupmyeondong: String::new(),
                    full_address: "제주특별자치도 제주시 한경면 노을해안로 1161".to_string(),
                },
            ),
            EnrichedStation::without_address(station(999, 126.0, 35.0, "무명", "")),
        ]
    }

    #[test]
    fn default_file_name_embeds_timestamp() {
        assert_eq!(
            default_file_name("202501010900"),
            "enriched_weather_stations_202501010900.csv"
        );
        assert_eq!(
            default_path(Path::new("out"), "202501010900"),
            PathBuf::from("out/enriched_weather_stations_202501010900.csv")
        );
    }

    #[tokio::test]
    async fn writes_header_and_one_row_per_station() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.csv");
        let rows = sample_rows();
        write_csv(&path, &rows, false).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        assert_eq!(lines.count(), rows.len());
    }

    #[tokio::test]
    async fn bom_is_written_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let with_bom = dir.path().join("bom.csv");
        let without_bom = dir.path().join("plain.csv");
        write_csv(&with_bom, &sample_rows(), true).await.unwrap();
        write_csv(&without_bom, &sample_rows(), false).await.unwrap();

        assert!(std::fs::read(&with_bom).unwrap().starts_with(UTF8_BOM));
        assert!(!std::fs::read(&without_bom).unwrap().starts_with(UTF8_BOM));
    }

    #[tokio::test]
    async fn round_trips_identifiers_and_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stations.csv");
        let rows = sample_rows();
        write_csv(&path, &rows, true).await.unwrap();

        let read = read_csv(&path).await.unwrap();
        assert_eq!(read.len(), rows.len());
        for (written, read) in rows.iter().zip(&read) {
            assert_eq!(written.station.id, read.station.id);
            assert!((written.station.location.longitude - read.station.location.longitude).abs() < 1e-9);
            assert!((written.station.location.latitude - read.station.location.latitude).abs() < 1e-9);
            assert_eq!(written.station.name_ko, read.station.name_ko);
            assert_eq!(written.station.name_en, read.station.name_en);
            assert_eq!(written.address, read.address);
        }
    }

    #[tokio::test]
    async fn read_rejects_files_without_station_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let err = read_csv(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingColumn { ref column, .. } if column == "STN_ID"));
    }

    #[tokio::test]
    async fn read_reports_bad_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let mut text = COLUMNS.join(",");
        text.push_str("\n108,east,37.5,1,1,1,1,1,1,47108,서울,Seoul,11B10101,1111011500,10190,,,,\n");
        std::fs::write(&path, text).unwrap();
        match read_csv(&path).await {
            Err(StorageError::InvalidValue { row, column, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "LON");
            }
            other => panic!("expected invalid value, got {:?}", other.map(|r| r.len())),
        }
    }
}
