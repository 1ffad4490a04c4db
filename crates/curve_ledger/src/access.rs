//! Role checks for admin-gated operations

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Emergency mode, sweeps, fee management, role management
    Admin,
    /// May deploy tokens through the factory
    Deployer,
}

#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    members: HashMap<Role, HashSet<Address>>,
}

impl AccessControl {
    /// Seed with a single admin; the zero address is rejected
    pub fn with_admin(admin: Address) -> Result<Self, LedgerError> {
        if admin == Address::ZERO {
            return Err(LedgerError::InvalidAddress);
        }
        let mut acl = Self::default();
        acl.members.entry(Role::Admin).or_default().insert(admin);
        Ok(acl)
    }

    pub fn has_role(&self, role: Role, who: &Address) -> bool {
        self.members.get(&role).is_some_and(|m| m.contains(who))
    }

    /// Fail with `NotAuthorized` unless `who` holds `role`
    pub fn ensure(&self, role: Role, who: &Address) -> Result<(), LedgerError> {
        if self.has_role(role, who) {
            Ok(())
        } else {
            Err(LedgerError::NotAuthorized)
        }
    }

    pub fn grant(&mut self, caller: &Address, role: Role, who: Address) -> Result<(), LedgerError> {
        self.ensure(Role::Admin, caller)?;
        if who == Address::ZERO {
            return Err(LedgerError::InvalidAddress);
        }
        self.members.entry(role).or_default().insert(who);
        log::info!("granted {:?} to {}", role, who);
        Ok(())
    }

    /// The last admin cannot be revoked
    pub fn revoke(&mut self, caller: &Address, role: Role, who: &Address) -> Result<(), LedgerError> {
        self.ensure(Role::Admin, caller)?;
        let members = self.members.entry(role).or_default();
        if role == Role::Admin && members.len() == 1 && members.contains(who) {
            return Err(LedgerError::InvalidConfiguration("cannot revoke the last admin"));
        }
        if members.remove(who) {
            log::info!("revoked {:?} from {}", role, who);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_manages_roles() {
        let admin = Address::repeat_byte(1);
        let user = Address::repeat_byte(2);
        let mut acl = AccessControl::with_admin(admin).unwrap();

        assert!(!acl.has_role(Role::Deployer, &user));
        acl.grant(&admin, Role::Deployer, user).unwrap();
        assert!(acl.has_role(Role::Deployer, &user));
        acl.revoke(&admin, Role::Deployer, &user).unwrap();
        assert!(!acl.has_role(Role::Deployer, &user));
    }

    #[test]
    fn test_non_admin_cannot_grant() {
        let admin = Address::repeat_byte(1);
        let user = Address::repeat_byte(2);
        let mut acl = AccessControl::with_admin(admin).unwrap();
        assert_eq!(acl.grant(&user, Role::Deployer, user), Err(LedgerError::NotAuthorized));
        assert_eq!(acl.ensure(Role::Admin, &user), Err(LedgerError::NotAuthorized));
    }

    #[test]
    fn test_zero_admin_rejected() {
        assert_eq!(AccessControl::with_admin(Address::ZERO).unwrap_err(), LedgerError::InvalidAddress);
    }

    #[test]
    fn test_last_admin_stays() {
        let admin = Address::repeat_byte(1);
        let mut acl = AccessControl::with_admin(admin).unwrap();
        assert!(acl.revoke(&admin, Role::Admin, &admin).is_err());
        assert!(acl.has_role(Role::Admin, &admin));
    }
}
