pub mod collectible;
pub mod suggestion;
pub mod token;

pub use collectible::{Collectible, CollectibleContract, CollectibleInfo, ContractInfo};
pub use suggestion::{Erc20Asset, SuggestedAssetMeta, SuggestionStatus, WatchedAsset};
pub use token::Token;
