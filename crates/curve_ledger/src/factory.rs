//! Token registry: deploys new curve tokens and vouches for them

use alloy_primitives::{keccak256, Address};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::access::{AccessControl, Role};
use crate::error::LedgerError;

/// Record of one deployed token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub token: Address,
    pub name: String,
    pub symbol: String,
    pub admin: Address,
    pub deployer: Address,
    pub nonce: u64,
}

#[derive(Debug, Clone)]
pub struct TokenFactory {
    address: Address,
    access: AccessControl,
    nonce: u64,
    tokens: HashMap<Address, Deployment>,
    order: Vec<Address>,
}

impl TokenFactory {
    /// `admin` also receives the `Deployer` role
    pub fn new(address: Address, admin: Address) -> Result<Self, LedgerError> {
        let mut access = AccessControl::with_admin(admin)?;
        access.grant(&admin, Role::Deployer, admin)?;
        Ok(Self { address, access, nonce: 0, tokens: HashMap::new(), order: Vec::new() })
    }

    /// Register a new token. The address is keccak256(factory ‖ nonce),
    /// truncated to 20 bytes.
    pub fn deploy(
        &mut self,
        caller: Address,
        name: &str,
        symbol: &str,
        admin: Address,
    ) -> Result<Deployment, LedgerError> {
        self.access.ensure(Role::Deployer, &caller)?;
        let (name, symbol) = (name.trim(), symbol.trim());
        if name.is_empty() || symbol.is_empty() {
            return Err(LedgerError::EmptyString);
        }
        if admin == Address::ZERO {
            return Err(LedgerError::InvalidAddress);
        }

        let token = self.next_address();
        let deployment = Deployment {
            token,
            name: name.to_string(),
            symbol: symbol.to_string(),
            admin,
            deployer: caller,
            nonce: self.nonce,
        };
        self.nonce += 1;
        self.tokens.insert(token, deployment.clone());
        self.order.push(token);

        log::info!("deployed {} ({}) at {} for admin {}", deployment.name, deployment.symbol, token, admin);
        Ok(deployment)
    }

    pub fn is_valid_token(&self, token: &Address) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn get(&self, token: &Address) -> Result<&Deployment, LedgerError> {
        self.tokens.get(token).ok_or(LedgerError::UnknownToken)
    }

    /// Deployments in the order they were made
    pub fn deployments(&self) -> impl Iterator<Item = &Deployment> {
        self.order.iter().filter_map(|t| self.tokens.get(t))
    }

    pub fn grant_role(&mut self, caller: Address, role: Role, who: Address) -> Result<(), LedgerError> {
        self.access.grant(&caller, role, who)
    }

    pub fn revoke_role(&mut self, caller: Address, role: Role, who: Address) -> Result<(), LedgerError> {
        self.access.revoke(&caller, role, &who)
    }

    fn next_address(&self) -> Address {
        let mut preimage = [0u8; 28];
        preimage[..20].copy_from_slice(self.address.as_slice());
        preimage[20..].copy_from_slice(&self.nonce.to_be_bytes());
        Address::from_word(keccak256(preimage))
    }
}
