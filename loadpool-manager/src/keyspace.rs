/// Namespace used when the configuration leaves it empty.
pub const DEFAULT_NAMESPACE: &str = "SLM";

/// Suffix of the key holding the membership set.
pub const MEMBERSHIP_SUFFIX: &str = "SET";

/// Suffix of the key holding the serialized load snapshot.
pub const SNAPSHOT_SUFFIX: &str = "DATA";

/// Key layout of one pool: `<namespace>:<pool_type>:<suffix>`.
///
/// Two members with the same namespace and pool type share the same keys and
/// therefore the same pool; a different pool type never touches them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    namespace: String,
    pool_type: String,
}

impl Keyspace {
    pub fn new(namespace: &str, pool_type: &str) -> Self {
        let namespace = if namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            namespace
        };
        Keyspace {
            namespace: namespace.to_owned(),
            pool_type: pool_type.to_owned(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn pool_type(&self) -> &str {
        &self.pool_type
    }

    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{}:{}", self.namespace, self.pool_type, suffix)
    }

    pub fn membership_key(&self) -> String {
        self.key(MEMBERSHIP_SUFFIX)
    }

    pub fn snapshot_key(&self) -> String {
        self.key(SNAPSHOT_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_namespace_type_suffix_layout() {
        let keyspace = Keyspace::new("deploy-a", "SOCKET");

        assert_eq!(keyspace.membership_key(), "deploy-a:SOCKET:SET");
        assert_eq!(keyspace.snapshot_key(), "deploy-a:SOCKET:DATA");
    }

    #[test]
    fn empty_namespace_falls_back_to_default() {
        let keyspace = Keyspace::new("", "SOCKET");

        assert_eq!(keyspace.namespace(), DEFAULT_NAMESPACE);
        assert_eq!(keyspace.membership_key(), "SLM:SOCKET:SET");
    }

    #[test]
    fn pool_types_do_not_share_keys() {
        let sockets = Keyspace::new("SLM", "SOCKET");
        let workers = Keyspace::new("SLM", "WORKER");

        assert_ne!(sockets.membership_key(), workers.membership_key());
        assert_ne!(sockets.snapshot_key(), workers.snapshot_key());
    }
}
