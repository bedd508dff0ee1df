pub mod hybrid;
pub mod mmr;
pub mod normalize;
pub mod text_search;

pub use hybrid::{fuse, HybridSource};
pub use mmr::{cosine_similarity, mmr_select, Diversifiable};
pub use normalize::{min_max_normalize, normalize_hits};
pub use text_search::TextSearch;
