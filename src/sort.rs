// src/sort.rs

/// Orderings the question listings support.
///
/// Every key except creation date falls through to description, then
/// creation date, then id, all in the same direction, so page boundaries
/// stay stable between reads. Title and the pool keys sort on the joined
/// side tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSort {
    TypeAsc,
    TypeDesc,
    TitleAsc,
    TitleDesc,
    DescriptionAsc,
    DescriptionDesc,
    PoolDifficultyAsc,
    PoolDifficultyDesc,
    PoolPointsAsc,
    PoolPointsDesc,
    PoolTitleAsc,
    PoolTitleDesc,
    CreatedDateAsc,
    CreatedDateDesc,
}

impl QuestionSort {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            Self::TypeAsc => "q.type ASC, q.description ASC, q.created_at ASC, q.id ASC",
            Self::TypeDesc => "q.type DESC, q.description DESC, q.created_at DESC, q.id DESC",
            Self::TitleAsc => "t.title ASC, q.description ASC, q.created_at ASC, q.id ASC",
            Self::TitleDesc => "t.title DESC, q.description DESC, q.created_at DESC, q.id DESC",
            Self::DescriptionAsc => "q.description ASC, q.created_at ASC, q.id ASC",
            Self::DescriptionDesc => "q.description DESC, q.created_at DESC, q.id DESC",
            Self::PoolDifficultyAsc => {
                "p.difficulty ASC, q.description ASC, q.created_at ASC, q.id ASC"
            }
            Self::PoolDifficultyDesc => {
                "p.difficulty DESC, q.description DESC, q.created_at DESC, q.id DESC"
            }
            Self::PoolPointsAsc => "p.points ASC, q.description ASC, q.created_at ASC, q.id ASC",
            Self::PoolPointsDesc => {
                "p.points DESC, q.description DESC, q.created_at DESC, q.id DESC"
            }
            Self::PoolTitleAsc => "p.title ASC, q.description ASC, q.created_at ASC, q.id ASC",
            Self::PoolTitleDesc => "p.title DESC, q.description DESC, q.created_at DESC, q.id DESC",
            Self::CreatedDateAsc => "q.created_at ASC, q.id ASC",
            Self::CreatedDateDesc => "q.created_at DESC, q.id DESC",
        }
    }
}

/// Cut one page out of an already sorted listing.
///
/// Pages are 1-based. Both the page number and the page size must be
/// present for paging to happen; otherwise the whole listing comes back.
/// A window falling partly or wholly outside the listing is clamped, so
/// page 0 or a page past the end yields an empty page, never an error.
pub fn paginate<T>(items: Vec<T>, page_num: Option<i64>, page_size: Option<i64>) -> Vec<T> {
    let (Some(num), Some(size)) = (page_num, page_size) else {
        return items;
    };
    let len = items.len() as i64;
    let start = num.saturating_sub(1).saturating_mul(size).clamp(0, len);
    let end = num.saturating_mul(size).clamp(start, len);
    items
        .into_iter()
        .skip(start as usize)
        .take((end - start) as usize)
        .collect()
}
