use crate::{auth::repo::UserStore, error::ApiError};

/// The authenticated caller attached to a request. Upstream verification
/// either already resolved the numeric user id, or it only knows the token's
/// subject username and the id has to come from the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    ResolvedId(i64),
    Username(String),
}

/// The id every data operation is scoped by. An unresolvable principal (the
/// account vanished after the token was issued) is an authorization failure,
/// never a server error.
pub async fn resolve_user_id(
    principal: &Principal,
    users: &dyn UserStore,
) -> Result<i64, ApiError> {
    match principal {
        Principal::ResolvedId(id) => Ok(*id),
        Principal::Username(name) => {
            let user = users
                .find_by_username(name)
                .await?
                .ok_or(ApiError::IdentityNotFound)?;
            Ok(user.id)
        }
    }
}
