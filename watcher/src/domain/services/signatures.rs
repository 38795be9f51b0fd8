//! Static method-signature lookup: the first four calldata bytes mapped to
//! a coarse category label. Decoding beyond this table is out of scope.

/// Known 4-byte selectors and their category labels
const SIGNATURE_TABLE: &[(&str, &str)] = &[
    ("0xa9059cbb", "ERC20_TRANSFER"),
    ("0x23b872dd", "ERC20_TRANSFER_FROM"),
    ("0x095ea7b3", "ERC20_APPROVE"),
    ("0xd0e30db0", "WRAP_DEPOSIT"),
    ("0x2e1a7d4d", "WRAP_WITHDRAW"),
    ("0x38ed1739", "UNISWAP_SWAP"),
    ("0x7ff36ab5", "UNISWAP_SWAP"),
    ("0x18cbafe5", "UNISWAP_SWAP"),
    ("0x5c11d795", "UNISWAP_SWAP"),
    ("0x3593564c", "ROUTER_EXECUTE"),
    ("0x24856bc3", "ROUTER_EXECUTE"),
    ("0xac9650d8", "MULTICALL"),
    ("0x5ae401dc", "MULTICALL"),
    ("0xe8e33700", "ADD_LIQUIDITY"),
    ("0xbaa2abde", "REMOVE_LIQUIDITY"),
    ("0x40c10f19", "TOKEN_MINT"),
    ("0xa0712d68", "TOKEN_MINT"),
    ("0x42966c68", "TOKEN_BURN"),
    ("0x1249c58b", "NFT_MINT"),
    ("0x42842e0e", "NFT_SAFE_TRANSFER_FROM"),
    ("0xb88d4fde", "NFT_SAFE_TRANSFER_FROM"),
    ("0xa22cb465", "NFT_SET_APPROVAL_FOR_ALL"),
];

/// Category for a plain value transfer (legacy transaction, no calldata)
pub const NATIVE_TRANSFER: &str = "NATIVE_TRANSFER";
/// Category for an empty-calldata call from a typed transaction
pub const SIMPLE_CONTRACT_CALL: &str = "SIMPLE_CONTRACT_CALL";
/// Category for calldata whose selector is not in the table
pub const UNKNOWN_CONTRACT_INTERACTION: &str = "UNKNOWN_CONTRACT_INTERACTION";
/// Category of router execute calls, used by suspicious-activity detection
pub const ROUTER_EXECUTE: &str = "ROUTER_EXECUTE";

/// Categorize a transaction by its calldata and EVM type.
pub fn categorize_transaction(data: &str, tx_type: i64) -> &'static str {
    let data = data.trim();
    if data.is_empty() || data == "0x" {
        return if tx_type == 0 {
            NATIVE_TRANSFER
        } else {
            SIMPLE_CONTRACT_CALL
        };
    }

    let selector = data.to_lowercase();
    if selector.len() < 10 {
        return UNKNOWN_CONTRACT_INTERACTION;
    }

    SIGNATURE_TABLE
        .iter()
        .find(|(sig, _)| selector.starts_with(sig))
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_CONTRACT_INTERACTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(
            categorize_transaction("0xa9059cbb000000000000", 2),
            "ERC20_TRANSFER"
        );
        assert_eq!(
            categorize_transaction("0x42842E0E00aa", 2),
            "NFT_SAFE_TRANSFER_FROM"
        );
        assert_eq!(categorize_transaction("0x3593564cdeadbeef", 2), ROUTER_EXECUTE);
    }

    #[test]
    fn test_empty_calldata_split_by_type() {
        assert_eq!(categorize_transaction("", 0), NATIVE_TRANSFER);
        assert_eq!(categorize_transaction("0x", 0), NATIVE_TRANSFER);
        assert_eq!(categorize_transaction("", 2), SIMPLE_CONTRACT_CALL);
    }

    #[test]
    fn test_unknown_selector() {
        assert_eq!(
            categorize_transaction("0xdeadbeef00", 2),
            UNKNOWN_CONTRACT_INTERACTION
        );
        assert_eq!(categorize_transaction("0xdead", 2), UNKNOWN_CONTRACT_INTERACTION);
    }
}
