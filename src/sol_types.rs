//! Solidity types for contract interaction
//!
//! The charging contract is deployed and maintained elsewhere; only the calls
//! and events this crate uses are declared here.

use alloy::sol;

sol! {
    /// Rate registry taking a flat schedule per operator.
    #[sol(rpc)]
    interface RateRegistryV1 {
        function setRates(address owner, uint256[] rates, uint256 roaming, uint256 precision) external;
    }

    /// Rate registry keyed by operator and price region.
    #[sol(rpc)]
    interface RateRegistryV2 {
        function setRates(
            address owner,
            bytes32 region,
            uint256[] rates,
            uint256 roaming,
            uint256 precision
        ) external;
    }

    #[sol(rpc)]
    interface ChargingNetwork {
        event RateRequest();
        event NewRates(address indexed cpo, bytes32 region);

        function isRegistered(address account) external view returns (bool);
        function isEV(address account) external view returns (bool);
        function isCPO(address account) external view returns (bool);
        function isCS(address account) external view returns (bool);

        function registerEV() external;
        function registerCPO(bool automaticRates) external;
        function registerCS(address cs, uint256 powerDischarge) external;

        function proposeDeal(address cpo) external;
        function respondDeal(address ev, bool accepted, uint256 dealId) external;

        function connect(address peer, uint256 nonce) external;
        function disconnect(address cs) external;

        function registerNextRoaming(uint256 roaming) external;
        function updateAutomaticRates() external;

        function requestCharging(uint256 wattHours, address cs, address cpo, uint256 startTime) external;
        function acknowledgeCharging(address ev, uint256 schemeId) external;
        function stopCharging(address cs) external;
        function scheduleSmartCharging(address cs, address cpo) external;
        function acceptSmartCharging(uint256 wattHours, address cs, uint256 schemeId) external;
    }
}
