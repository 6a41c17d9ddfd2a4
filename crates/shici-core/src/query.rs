//! Filtering and phonetic ordering of the visible poem list.

use crate::favorites::FavoritesLedger;
use crate::phonetic::sort_key;
use crate::poem::PoemRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use ts_rs::TS;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SearchCriteria {
    pub title: String,
    pub author: String,
    pub dynasty: String,
}

impl SearchCriteria {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        dynasty: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            dynasty: dynasty.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.author.trim().is_empty()
            && self.dynasty.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SortColumn {
    Title,
    Author,
    Dynasty,
}

impl SortColumn {
    fn field(self, record: &PoemRecord) -> &str {
        match self {
            SortColumn::Title => &record.title,
            SortColumn::Author => &record.author,
            SortColumn::Dynasty => &record.dynasty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SortDirection {
    Ascending,
    Descending,
    #[default]
    Unsorted,
}

impl SortDirection {
    fn next(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Unsorted,
            SortDirection::Unsorted => SortDirection::Ascending,
        }
    }
}

/// Case-insensitive substring filter; empty criteria match everything.
/// Input order is preserved.
pub fn filter<'a>(
    records: impl IntoIterator<Item = &'a PoemRecord>,
    criteria: &SearchCriteria,
) -> Vec<&'a PoemRecord> {
    let title = fold(&criteria.title);
    let author = fold(&criteria.author);
    let dynasty = fold(&criteria.dynasty);
    records
        .into_iter()
        .filter(|record| {
            field_matches(&record.title, &title)
                && field_matches(&record.author, &author)
                && field_matches(&record.dynasty, &dynasty)
        })
        .collect()
}

/// Order `records` by the phonetic key of `column`. `Unsorted` returns the
/// input order unchanged. Ties keep their input order.
pub fn sort_by_column<'a>(
    mut records: Vec<&'a PoemRecord>,
    column: SortColumn,
    direction: SortDirection,
) -> Vec<&'a PoemRecord> {
    match direction {
        SortDirection::Unsorted => {}
        SortDirection::Ascending => {
            records.sort_by_cached_key(|record| sort_key(column.field(record)));
        }
        SortDirection::Descending => {
            records.sort_by_cached_key(|record| std::cmp::Reverse(sort_key(column.field(record))));
        }
    }
    records
}

/// Favorites view: membership filter, then title ascending. Ignores any
/// column sort state.
pub fn favorites_only<'a>(
    records: impl IntoIterator<Item = &'a PoemRecord>,
    favorites: &FavoritesLedger,
) -> Vec<&'a PoemRecord> {
    let members: Vec<&PoemRecord> = records
        .into_iter()
        .filter(|record| favorites.is_favorite(&record.key()))
        .collect();
    sort_by_column(members, SortColumn::Title, SortDirection::Ascending)
}

/// Phonetic comparison of two strings.
pub fn compare_phonetic(a: &str, b: &str) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}

/// Column sort state driven by repeated header clicks:
/// ascending, descending, then back to the original order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    column: Option<SortColumn>,
    direction: SortDirection,
}

impl SortState {
    pub fn column(&self) -> Option<SortColumn> {
        self.column
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Advance the cycle for `column`. A different column restarts at
    /// ascending.
    pub fn cycle(&mut self, column: SortColumn) -> SortDirection {
        self.direction = if self.column == Some(column) {
            self.direction.next()
        } else {
            SortDirection::Ascending
        };
        self.column = Some(column);
        self.direction
    }

    pub fn apply<'a>(&self, records: Vec<&'a PoemRecord>) -> Vec<&'a PoemRecord> {
        match self.column {
            Some(column) => sort_by_column(records, column, self.direction),
            None => records,
        }
    }

    /// Cycle `column` and return `records` in the resulting order.
    pub fn sort_by_column<'a>(
        &mut self,
        records: Vec<&'a PoemRecord>,
        column: SortColumn,
    ) -> Vec<&'a PoemRecord> {
        self.cycle(column);
        self.apply(records)
    }
}

fn fold(text: &str) -> String {
    text.trim().nfkc().collect::<String>().to_lowercase()
}

fn field_matches(value: &str, needle: &str) -> bool {
    needle.is_empty() || fold(value).contains(needle)
}
