/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - access middleware が token を検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - token の検証ロジックは middleware/services 側の責務
 * - bearer は外部検証 (wallet_check) へ転送するためだけに持つ
 */

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `subject_id` は token の `sub` (users.id)
/// - `bearer` は検証済みの生 token。Debug には出さない
#[derive(Clone)]
pub struct AuthCtx {
    pub subject_id: String,
    bearer: String,
}

impl AuthCtx {
    pub fn new(subject_id: String, bearer: String) -> Self {
        Self { subject_id, bearer }
    }

    pub fn bearer(&self) -> &str {
        &self.bearer
    }
}

impl std::fmt::Debug for AuthCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCtx")
            .field("subject_id", &self.subject_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_the_bearer() {
        let ctx = AuthCtx::new("u1".into(), "secret.jwt.value".into());
        let printed = format!("{ctx:?}");

        assert!(printed.contains("u1"));
        assert!(!printed.contains("secret.jwt.value"));
    }
}
