//! Well-known mainnet contracts, used as candidates for token detection.

/// A contract from the static registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownContract {
    pub address: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
    pub erc20: bool,
}

const fn erc20(address: &'static str, name: &'static str, symbol: &'static str, decimals: u8) -> KnownContract {
    KnownContract {
        address,
        name,
        symbol,
        decimals,
        erc20: true,
    }
}

const fn erc721(address: &'static str, name: &'static str, symbol: &'static str) -> KnownContract {
    KnownContract {
        address,
        name,
        symbol,
        decimals: 0,
        erc20: false,
    }
}

pub static MAINNET_CONTRACTS: &[KnownContract] = &[
    erc20("0x6B175474E89094C44Da98b954EedeAC495271d0F", "Dai Stablecoin", "DAI", 18),
    erc20("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USD Coin", "USDC", 6),
    erc20("0xdAC17F958D2ee523a2206206994597C13D831ec7", "Tether USD", "USDT", 6),
    erc20("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", "Wrapped Ether", "WETH", 18),
    erc20("0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", "Wrapped BTC", "WBTC", 8),
    erc20("0x514910771AF9Ca656af840dff83E8264EcF986CA", "ChainLink Token", "LINK", 18),
    erc20("0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984", "Uniswap", "UNI", 18),
    erc20("0x9f8F72aA9304c8B593d555F12eF6589cC3A579A2", "Maker", "MKR", 18),
    erc20("0x7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9", "Aave Token", "AAVE", 18),
    erc20("0xc00e94Cb662C3520282E6f5717214004A7f26888", "Compound", "COMP", 18),
    erc20("0x0D8775F648430679A709E98d2b0Cb6250d2887EF", "Basic Attention Token", "BAT", 18),
    erc20("0xE41d2489571d322189246DaFA5ebDe1F4699F498", "0x Protocol Token", "ZRX", 18),
    erc20("0xC011a73ee8576Fb46F5E1c5751cA3B9Fe0af2a6F", "Synthetix Network Token", "SNX", 18),
    erc20("0xD533a949740bb3306d119CC777fa900bA034cd52", "Curve DAO Token", "CRV", 18),
    erc20("0x6B3595068778DD592e39A122f4f5a5cF09C90fE2", "SushiToken", "SUSHI", 18),
    erc721("0x06012c8cf97BEaD5deAe237070F9587f8E7A266d", "CryptoKitties", "CK"),
    erc721("0x57f1887a8BF19b14fC0dF6Fd9B2acc9Af147eA85", "ENS", "ENS"),
];

/// Look up a known contract regardless of address casing.
pub fn find(contracts: &[KnownContract], address: &str) -> Option<KnownContract> {
    contracts
        .iter()
        .find(|c| c.address.eq_ignore_ascii_case(address))
        .copied()
}
