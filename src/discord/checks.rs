// Permission guard chain used by `#[poise::command(check = ...)]`.
//
// Management: Administrator, or one of the guild's management roles.
// Staff: management, or one of the guild's staff roles.

use crate::core::guild_settings::GuildSettings;
use crate::discord::members::{author_is_admin, author_roles};
use crate::discord::{reject, Context, Error, OrReject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub is_management: bool,
    pub is_staff: bool,
}

impl Access {
    pub fn resolve(settings: &GuildSettings, member_roles: &[u64], is_admin: bool) -> Self {
        let is_management = is_admin || settings.is_management(member_roles);
        Self {
            is_management,
            is_staff: is_management || settings.is_staff(member_roles),
        }
    }
}

/// Work out what the invoking member may do in this guild.
pub async fn access(ctx: Context<'_>) -> Result<Access, Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in servers")?.get();
    let settings = ctx.data().settings.get(guild_id).await.or_reject()?;
    let roles = author_roles(ctx).await;
    let is_admin = author_is_admin(ctx).await;
    Ok(Access::resolve(&settings, &roles, is_admin))
}

pub async fn management_only(ctx: Context<'_>) -> Result<bool, Error> {
    if access(ctx).await?.is_management {
        Ok(true)
    } else {
        reject("This command is limited to management. Ask an admin to add your role with `/config roles`.")
    }
}

pub async fn staff_only(ctx: Context<'_>) -> Result<bool, Error> {
    if access(ctx).await?.is_staff {
        Ok(true)
    } else {
        reject("This command is limited to staff members.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GuildSettings {
        let mut settings = GuildSettings::new(1);
        settings.management_roles = vec![100];
        settings.staff_roles = vec![200];
        settings
    }

    #[test]
    fn test_admin_is_management_without_roles() {
        let access = Access::resolve(&settings(), &[], true);
        assert!(access.is_management);
        assert!(access.is_staff);
    }

    #[test]
    fn test_staff_role_is_not_management() {
        let access = Access::resolve(&settings(), &[200], false);
        assert!(!access.is_management);
        assert!(access.is_staff);
    }

    #[test]
    fn test_no_roles_no_access() {
        assert_eq!(
            Access::resolve(&settings(), &[300], false),
            Access {
                is_management: false,
                is_staff: false
            }
        );
    }
}
