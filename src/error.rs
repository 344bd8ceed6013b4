//! Error taxonomy for the facet preparation pipeline.

use crate::group::GroupRole;
use thiserror::Error;

/// Result type alias using [`FacetError`].
pub type Result<T> = std::result::Result<T, FacetError>;

/// Everything that can abort (or, for filters, degrade) a plot build.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FacetError {
    /// A plot kind needs an axis binding that was not supplied.
    #[error("Must provide a column name for \"{0}\"")]
    MissingAxis(&'static str),

    /// An axis names a column the dataset does not have.
    #[error("{axis}-column \"{column}\" is not in the dataset")]
    AxisColumnNotFound {
        /// Logical axis ("x", "y", "z").
        axis: &'static str,
        /// Offending column name.
        column: String,
    },

    /// An axis column holds values that are neither numbers nor dates.
    #[error("Could not convert {axis}-column \"{column}\" to float or datetime")]
    AxisConversion {
        /// Logical axis ("x", "y", "z").
        axis: &'static str,
        /// Offending column name.
        column: String,
    },

    /// Twin-axis cardinality mismatch.
    #[error("{0}")]
    TwinAxis(String),

    /// Both twin flags were set.
    #[error("cannot simultaneously twin x and y axes")]
    DoubleTwin,

    /// A grouping column is absent from the dataset.
    #[error("Grouping column \"{column}\" for {role} is not in the dataset")]
    GroupingColumnNotFound {
        /// Grouping role that named the column.
        role: GroupRole,
        /// Offending column name.
        column: String,
    },

    /// A grouping produced no distinct groups.
    #[error("The number of unique groups in the data for \"{role}=[{columns}]\" is 0")]
    NoGroups {
        /// Grouping role.
        role: GroupRole,
        /// Comma-joined grouping columns.
        columns: String,
    },

    /// The planned grid has zero rows or zero columns.
    #[error("Cannot make subplot(s): number of {0} is 0")]
    EmptyGrid(&'static str),

    /// Nothing left to plot.
    #[error("Dataset is empty. Nothing to plot!")]
    EmptyData,

    /// Invalid or unknown configuration option.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The filter expression could not be parsed.
    #[error("Could not parse filter \"{expression}\": {reason}")]
    FilterParse {
        /// Expression after alias rewriting.
        expression: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The filter expression parsed but could not be evaluated.
    #[error("Could not evaluate filter: {0}")]
    FilterEval(String),
}

impl FacetError {
    /// True for the grouping branch of the taxonomy.
    pub fn is_grouping_error(&self) -> bool {
        matches!(
            self,
            FacetError::GroupingColumnNotFound { .. } | FacetError::NoGroups { .. }
        )
    }

    /// True for configuration errors that are reported before any computation.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FacetError::MissingAxis(_)
                | FacetError::AxisColumnNotFound { .. }
                | FacetError::AxisConversion { .. }
                | FacetError::TwinAxis(_)
                | FacetError::DoubleTwin
                | FacetError::EmptyGrid(_)
                | FacetError::Config(_)
        )
    }

    /// Filter failures are recoverable: callers fall back to unfiltered data.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FacetError::FilterParse { .. } | FacetError::FilterEval(_)
        )
    }
}
