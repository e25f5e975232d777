//! The closed set of commands a market node handles.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Remote callable command.
pub enum Command {
    GetContract,
    GetImage,
    GetProfile,
    GetUserMetadata,
    GetListings,
    GetContractMetadata,
    Follow,
    Unfollow,
    GetFollowers,
    GetFollowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Groups commands by the shape of their responses.
pub enum CommandFamily {
    /// `[blob]` or `NotFound`
    Content,
    /// `[payload, signature]` or `NotFound`
    Disclosure,
    /// `["True"]` or `AuthFailed`
    Relationship,
    /// `[records]` or `NotFound`
    Directory,
}

impl Command {
    /// Every command, in the order it is advertised to the transport.
    pub const ALL: [Command; 10] = [
        Command::GetContract,
        Command::GetImage,
        Command::GetProfile,
        Command::GetListings,
        Command::GetUserMetadata,
        Command::GetContractMetadata,
        Command::Follow,
        Command::Unfollow,
        Command::GetFollowers,
        Command::GetFollowing,
    ];

    /// The identifier of this command on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::GetContract => "get_contract",
            Command::GetImage => "get_image",
            Command::GetProfile => "get_profile",
            Command::GetUserMetadata => "get_user_metadata",
            Command::GetListings => "get_listings",
            Command::GetContractMetadata => "get_contract_metadata",
            Command::Follow => "follow",
            Command::Unfollow => "unfollow",
            Command::GetFollowers => "get_followers",
            Command::GetFollowing => "get_following",
        }
    }

    pub fn family(&self) -> CommandFamily {
        match self {
            Command::GetContract | Command::GetImage => CommandFamily::Content,
            Command::GetProfile
            | Command::GetUserMetadata
            | Command::GetListings
            | Command::GetContractMetadata => CommandFamily::Disclosure,
            Command::Follow | Command::Unfollow => CommandFamily::Relationship,
            Command::GetFollowers | Command::GetFollowing => CommandFamily::Directory,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Command> {
        Command::ALL
            .iter()
            .find(|command| command.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_names_parse_back() {
        for command in Command::ALL {
            assert_eq!(Command::from_str(command.as_str()).unwrap(), command);
        }

        assert!(matches!(
            Command::from_str("find_node"),
            Err(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn command_set_is_complete() {
        let mut all = Command::ALL.to_vec();
        all.sort();
        all.dedup();

        assert_eq!(all.len(), 10);
    }

    #[test]
    fn families() {
        assert_eq!(Command::GetImage.family(), CommandFamily::Content);
        assert_eq!(
            Command::GetContractMetadata.family(),
            CommandFamily::Disclosure
        );
        assert_eq!(Command::Unfollow.family(), CommandFamily::Relationship);
        assert_eq!(Command::GetFollowing.family(), CommandFamily::Directory);
    }
}
