use chrono::{DateTime, Utc};
use vinolink_model::{producer_label, RatingBasis};

/// What the "why" lines of one recommendation are built from.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationContext<'a> {
    pub basis: RatingBasis,
    pub producer: Option<&'a str>,
    pub in_stock: bool,
    /// Signal fetch time for direct matches, listing update time otherwise
    pub refreshed_at: DateTime<Utc>,
}

/// Human-readable reasons shown under a recommendation.
pub fn explain_recommendation(ctx: &RecommendationContext<'_>) -> Vec<String> {
    let rating_line = match ctx.basis {
        RatingBasis::Direct {
            rating,
            rating_count,
            ..
        } => format!("Vivino {:.1} with {} reviews", rating, rating_count),
        RatingBasis::ProducerAverage {
            rating,
            sample_size,
        } => format!(
            "Estimated {:.1} from {} rated wines by {}",
            rating,
            sample_size,
            producer_label(ctx.producer)
        ),
        RatingBasis::Unrated => {
            "Vivino rating is not matched yet; use the Vivino search link to verify".to_string()
        }
    };

    let stock_line = if ctx.in_stock {
        "Available based on latest inventory sync"
    } else {
        "Inventory can change quickly by store"
    };

    vec![
        rating_line,
        stock_line.to_string(),
        format!("Source refreshed {}", ctx.refreshed_at.format("%Y-%m-%d")),
    ]
}
