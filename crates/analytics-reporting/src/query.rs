use crate::Error;

/// Most dimensions a single report request can carry.
pub const MAX_DIMENSIONS: usize = 9;

/// Most metrics a single report request can carry.
pub const MAX_METRICS: usize = 10;

/// One report request: an inclusive date range plus ordered dimension and metric lists.
///
/// Dates are passed through to the service untouched, so either `YYYY-MM-DD` or one of the
/// relative keywords (`NdaysAgo`, `yesterday`, `today`) works.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportQuery {
    start_date: Box<str>,
    end_date: Box<str>,
    dimensions: Vec<Box<str>>,
    metrics: Vec<Box<str>>,
}

impl ReportQuery {
    pub fn new<S, E, D, M>(start_date: S, end_date: E, dimensions: D, metrics: M) -> crate::Result<Self>
    where
        S: Into<Box<str>>,
        E: Into<Box<str>>,
        D: IntoIterator,
        D::Item: Into<Box<str>>,
        M: IntoIterator,
        M::Item: Into<Box<str>>,
    {
        let query = Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            dimensions: dimensions.into_iter().map(Into::into).collect(),
            metrics: metrics.into_iter().map(Into::into).collect(),
        };

        query.validate()?;
        Ok(query)
    }

    fn validate(&self) -> crate::Result<()> {
        macro_rules! bail {
            ($($arg:tt)*) => {
                return Err(Error::InvalidQuery(format!($($arg)*).into_boxed_str()))
            };
        }

        if self.start_date.trim().is_empty() || self.end_date.trim().is_empty() {
            bail!("start and end dates are required");
        }

        if self.dimensions.len() > MAX_DIMENSIONS {
            bail!(
                "{} dimensions requested, at most {MAX_DIMENSIONS} are allowed",
                self.dimensions.len()
            );
        }

        match self.metrics.len() {
            0 => bail!("at least one metric is required"),
            n if n > MAX_METRICS => {
                bail!("{n} metrics requested, at most {MAX_METRICS} are allowed")
            }
            _ => (),
        }

        if let Some(blank) = self
            .dimensions
            .iter()
            .chain(self.metrics.iter())
            .position(|name| name.trim().is_empty())
        {
            bail!("dimension/metric #{blank} has an empty name");
        }

        Ok(())
    }

    #[inline]
    pub fn start_date(&self) -> &str {
        &self.start_date
    }

    #[inline]
    pub fn end_date(&self) -> &str {
        &self.end_date
    }

    #[inline]
    pub fn dimensions(&self) -> &[Box<str>] {
        &self.dimensions
    }

    #[inline]
    pub fn metrics(&self) -> &[Box<str>] {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_query() -> crate::Result<()> {
        let query = ReportQuery::new(
            "7daysAgo",
            "yesterday",
            ["ga:date", "ga:channelGrouping"],
            ["ga:sessions"],
        )?;

        assert_eq!(query.start_date(), "7daysAgo");
        assert_eq!(query.end_date(), "yesterday");
        assert_eq!(query.dimensions().len(), 2);
        assert_eq!(&*query.metrics()[0], "ga:sessions");
        Ok(())
    }

    #[test]
    fn test_dimensionless_query_is_fine() {
        assert!(ReportQuery::new("today", "today", Vec::<String>::new(), ["ga:users"]).is_ok());
    }

    #[test]
    fn test_limits() {
        let ten: Vec<String> = (0..10).map(|i| format!("ga:dimension{i}")).collect();
        let eleven: Vec<String> = (0..11).map(|i| format!("ga:metric{i}")).collect();

        let err = ReportQuery::new("today", "today", ten.clone(), ["ga:users"]).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));

        assert!(ReportQuery::new("today", "today", ten[..9].to_vec(), ten.clone()).is_ok());

        let err = ReportQuery::new("today", "today", ["ga:date"], eleven).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));

        let err = ReportQuery::new("today", "today", ["ga:date"], Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[test]
    fn test_blank_values_rejected() {
        assert!(ReportQuery::new("", "today", ["ga:date"], ["ga:users"]).is_err());
        assert!(ReportQuery::new("today", "today", [" "], ["ga:users"]).is_err());
    }
}
