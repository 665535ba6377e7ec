//! Walks every page of a report and concatenates them into one [`ReportTable`].

use crate::extract::{Extracted, extract_rows};
use crate::{Error, ReportFetcher, ReportPage, ReportQuery, ReportTable, Result, VENDOR_PREFIX};

/// The row offsets needed to cover a report, `0, page_size, 2 * page_size, ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOffsets {
    page_size: u64,
    pages: u64,
}

impl PageOffsets {
    /// Plans offsets from the first page's row count. Only reports larger than a single page
    /// that also came back with a continuation token are split, everything else is one
    /// segment at offset 0.
    pub fn plan(row_count: u64, page_size: u64, has_continuation: bool) -> Self {
        let pages = if page_size > 0 && row_count > page_size && has_continuation {
            row_count.div_ceil(page_size)
        } else {
            1
        };

        Self { page_size, pages }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pages as usize
    }

    /// Never true, every plan has at least offset 0.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + use<> {
        let page_size = self.page_size;
        (0..self.pages).map(move |page| page * page_size)
    }

    /// The offsets as page tokens.
    pub fn tokens(&self) -> impl Iterator<Item = String> + use<> {
        self.iter().map(|offset| offset.to_string())
    }
}

/// Fetches a full, unsampled report through a [`ReportFetcher`].
#[derive(Debug, Clone)]
pub struct PaginationAssembler<F> {
    fetcher: F,
}

impl<F: ReportFetcher> PaginationAssembler<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    #[inline]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetches every page of `query` and returns them as a single table, with the vendor
    /// prefix stripped from every column.
    ///
    /// Fails with [`Error::Sampled`] if any page carries sampling metadata. Nothing is
    /// returned unless every page was fetched.
    pub async fn assemble(&self, query: &ReportQuery) -> Result<ReportTable> {
        let page_size = self.fetcher.page_size();

        let first = self.fetcher.fetch(query, "0").await?;
        let row_count = first.row_count();

        info!(
            message = "fetched first report page",
            start_date = query.start_date(),
            end_date = query.end_date(),
            row_count,
        );

        reject_sampled(query, &first)?;

        let Extracted {
            rows,
            mut dropped_values,
        } = extract_rows(&first)?;

        let offsets = PageOffsets::plan(row_count, page_size, first.next_page_token().is_some());
        let rows_remaining = row_count.saturating_sub(rows.len() as u64);

        let mut table = ReportTable::with_capacity(rows.len() * offsets.len());
        table.extend(rows);

        if offsets.len() > 1 {
            info!(
                message = "report spans multiple pages",
                rows_remaining,
                remaining_pages = rows_remaining.div_ceil(page_size),
            );
        } else {
            info!("finalized segment");
        }

        // the first page is already in hand, so only the later offsets get fetched.
        for token in offsets.tokens().skip(1) {
            debug!(message = "fetching report page", page_token = %token);

            let page = self.fetcher.fetch(query, &token).await?;
            reject_sampled(query, &page)?;

            let extracted = extract_rows(&page)?;
            dropped_values += extracted.dropped_values;
            table.extend(extracted.rows);
        }

        dropped_values += table.strip_prefix(VENDOR_PREFIX);

        if table.len() as u64 != row_count {
            warn!(
                message = "assembled row count doesn't match the reported row count",
                expected = row_count,
                assembled = table.len(),
                dropped_values,
            );
        }

        Ok(table)
    }
}

fn reject_sampled(query: &ReportQuery, page: &ReportPage) -> Result<()> {
    if page.is_sampled() {
        warn!(
            message = "report contains sampled data",
            start_date = query.start_date(),
            end_date = query.end_date(),
        );

        return Err(Error::Sampled {
            start_date: query.start_date().into(),
            end_date: query.end_date().into(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment() {
        for row_count in [0, 1, 99_999, 100_000] {
            let offsets = PageOffsets::plan(row_count, 100_000, true);
            assert_eq!(offsets.iter().collect::<Vec<_>>(), [0]);
        }

        // without a continuation token the first page is all there is.
        let offsets = PageOffsets::plan(250_000, 100_000, false);
        assert_eq!(offsets.len(), 1);
    }

    #[test]
    fn test_multi_page_offsets() {
        let offsets = PageOffsets::plan(250_000, 100_000, true);
        assert_eq!(offsets.len(), 3);
        assert_eq!(
            offsets.tokens().collect::<Vec<_>>(),
            ["0", "100000", "200000"]
        );

        let offsets = PageOffsets::plan(300_000, 100_000, true);
        assert_eq!(offsets.iter().collect::<Vec<_>>(), [0, 100_000, 200_000]);

        let offsets = PageOffsets::plan(300_001, 100_000, true);
        assert_eq!(offsets.len(), 4);
    }

    #[test]
    fn test_offsets_strictly_increase() {
        let offsets: Vec<u64> = PageOffsets::plan(1_234_567, 100_000, true).iter().collect();
        assert_eq!(offsets.len(), 13);
        assert!(offsets.windows(2).all(|pair| pair[1] - pair[0] == 100_000));
        assert_eq!(offsets[0], 0);
    }

    #[test]
    fn test_zero_page_size() {
        assert_eq!(PageOffsets::plan(10, 0, true).len(), 1);
    }
}
