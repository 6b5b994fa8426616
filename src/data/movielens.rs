//! Readers for MovieLens rating files.
//!
//! Two layouts are accepted: the `UserID::MovieID::Rating::Timestamp` format of
//! the 1M release (`ratings.dat`) and the comma separated
//! `userId,movieId,rating,timestamp` format of the newer releases
//! (`ratings.csv`), whose header line is skipped.

use super::{Dataset, RawRating};
use crate::error::{MfError, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

const DAT_SEPARATOR: &str = "::";

pub fn parse_line(line: &str, line_number: usize) -> Result<RawRating> {
    let fields: Vec<&str> = if line.contains(DAT_SEPARATOR) {
        line.split(DAT_SEPARATOR).collect()
    } else {
        line.split(',').collect()
    };
    if fields.len() != 4 {
        return Err(MfError::Parse {
            line: line_number,
            message: format!("expected 4 fields, found {}", fields.len()),
        });
    }

    let field_error = |name: &str, value: &str| MfError::Parse {
        line: line_number,
        message: format!("invalid {name} {value:?}"),
    };
    let user_id = fields[0]
        .trim()
        .parse::<u64>()
        .map_err(|_| field_error("user id", fields[0]))?;
    let item_id = fields[1]
        .trim()
        .parse::<u64>()
        .map_err(|_| field_error("item id", fields[1]))?;
    let rating = fields[2]
        .trim()
        .parse::<f64>()
        .map_err(|_| field_error("rating", fields[2]))?;
    let timestamp = fields[3]
        .trim()
        .parse::<i64>()
        .map_err(|_| field_error("timestamp", fields[3]))?;

    if !rating.is_finite() {
        return Err(field_error("rating", fields[2]));
    }

    Ok(RawRating {
        user_id,
        item_id,
        rating,
        timestamp,
    })
}

fn is_header(line: &str) -> bool {
    line.split(',')
        .next()
        .is_some_and(|first| first.trim().parse::<u64>().is_err())
}

pub fn read_ratings<R: BufRead>(reader: R) -> Result<Vec<RawRating>> {
    let mut ratings = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if index == 0 && !trimmed.contains(DAT_SEPARATOR) && is_header(trimmed) {
            debug!("skipping header line {:?}", trimmed);
            continue;
        }
        ratings.push(parse_line(trimmed, index + 1)?);
    }
    Ok(ratings)
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let raw = read_ratings(BufReader::new(file))?;
    let dataset = Dataset::from_raw(&raw);

    let span = dataset
        .ratings
        .timestamps()
        .iter()
        .min()
        .zip(dataset.ratings.timestamps().iter().max())
        .and_then(|(&first, &last)| {
            Some((
                DateTime::<Utc>::from_timestamp(first, 0)?,
                DateTime::<Utc>::from_timestamp(last, 0)?,
            ))
        });
    info!(
        path = %path.display(),
        ratings = dataset.len(),
        users = dataset.n_users(),
        items = dataset.n_items(),
        "loaded ratings"
    );
    if let Some((first, last)) = span {
        info!("ratings span {} to {}", first.date_naive(), last.date_naive());
    }
    Ok(dataset)
}
