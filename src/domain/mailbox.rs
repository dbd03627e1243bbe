/// One watched mailbox: a unique name (the address) plus the opaque
/// credential line used to authenticate against the mail API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxRecord {
    pub name: String,
    pub account: String,
}

/// Parses `email:password:refresh_token:client_id` lines into mailbox
/// records. Lines without exactly four fields, or whose first field is not
/// an address, are dropped silently.
pub fn parse_credential_lines(input: &str) -> Vec<MailboxRecord> {
    input
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() != 4 {
                return None;
            }
            let name = parts[0].trim();
            if !name.contains('@') {
                return None;
            }
            Some(MailboxRecord {
                name: name.to_string(),
                account: line.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_lines() {
        let input = "a@x.com:pass:refresh:client\r\nb@y.com:p2:r2:c2\n";
        let records = parse_credential_lines(input);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "a@x.com");
        assert_eq!(records[0].account, "a@x.com:pass:refresh:client");
        assert_eq!(records[1].name, "b@y.com");
    }

    #[test]
    fn drops_malformed_lines() {
        let input = "\n\
            a@x.com:pass:refresh\n\
            a@x.com:pass:refresh:client:extra\n\
            not-an-email:pass:refresh:client\n\
            b@y.com:p:r:c\n";
        let records = parse_credential_lines(input);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "b@y.com");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let records = parse_credential_lines("  a@x.com:p:r:c  ");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].account, "a@x.com:p:r:c");
    }
}
