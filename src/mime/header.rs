//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Memoryhole.
//
// Memoryhole is free software: you can redistribute it and/or modify it under
// the terms of the  GNU General Public License as published  by the Free
// Software Foundation, either version 3 of  the License, or (at your option)
// any later version.
//
// Memoryhole is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY;  without even the  implied warranty of  MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Memoryhole. If not, see <http://www.gnu.org/licenses/>.

//! Utilities for working with individual RFC 2822 headers.

use std::borrow::Cow;
use std::str;

use nom::{
    branch::alt,
    bytes::complete::{is_a, is_not, take, take_while1},
    character::complete::char,
    combinator::{all_consuming, map, opt},
    multi::{fold_many0, many0, many0_count, many1_count, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use super::model::*;

type PResult<'a, T> = IResult<&'a [u8], T>;

const SPACE: &[u8] = b" ";

// RFC 2822 3.2.2 "quoted-pair", including the 8-bit clean "obsolete" syntax
fn quoted_pair(i: &[u8]) -> PResult<&[u8]> {
    preceded(char('\\'), take(1usize))(i)
}

// RFC 2822 3.2.3 "Folding white space".
// Values reach here already split into lines, so the line-ending characters
// are simply treated as whitespace.
fn fws(i: &[u8]) -> PResult<&[u8]> {
    map(is_a(" \t\r\n"), |_| SPACE)(i)
}

// RFC 2822 3.2.3 "Comment text".
fn ctext(i: &[u8]) -> PResult<&[u8]> {
    is_not("()\\ \t\r\n")(i)
}

// RFC 2822 3.2.3 "Comment content". FWS is moved in here from the comment
// production to keep that one simple.
fn ccontent(i: &[u8]) -> PResult<()> {
    alt((
        map(ctext, |_| ()),
        map(quoted_pair, |_| ()),
        map(fws, |_| ()),
        comment,
    ))(i)
}

// RFC 2822 3.2.3 "Comment". Note it is recursive.
fn comment(i: &[u8]) -> PResult<()> {
    map(delimited(char('('), many0_count(ccontent), char(')')), |_| ())(i)
}

// RFC 2822 3.2.3 "Comment or folding white space". Always succeeds.
fn cfws(i: &[u8]) -> PResult<()> {
    map(many0_count(alt((map(fws, |_| ()), comment))), |_| ())(i)
}

// RFC 2822 3.2.4 "Atom text", amended by RFC 6532 to include all non-ASCII
// characters
fn is_atext(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || b"!#$%&'*+-/=?^_`{|}~".contains(&ch)
        || ch >= 0x80
}

fn atext(i: &[u8]) -> PResult<&[u8]> {
    take_while1(is_atext)(i)
}

// RFC 2822 3.2.4 "Atom"
fn atom(i: &[u8]) -> PResult<&[u8]> {
    delimited(cfws, atext, cfws)(i)
}

// RFC 2822 3.2.5 "Quoted [string] text", amended by RFC 6532
fn qtext(i: &[u8]) -> PResult<&[u8]> {
    is_not(" \t\r\n\\\"")(i)
}

// RFC 2822 3.2.5 "Quoted [string] content", with FWS moved in from the
// quoted-string production.
fn qcontent(i: &[u8]) -> PResult<&[u8]> {
    alt((qtext, quoted_pair, fws))(i)
}

fn append_cow<'a>(mut acc: Cow<'a, [u8]>, item: &'a [u8]) -> Cow<'a, [u8]> {
    if acc.is_empty() {
        acc = Cow::Borrowed(item);
    } else {
        acc.to_mut().extend_from_slice(item);
    }
    acc
}

// RFC 2822 3.2.5 "Quoted string"
fn quoted_string(i: &[u8]) -> PResult<Cow<[u8]>> {
    delimited(
        pair(cfws, char('"')),
        fold_many0(qcontent, || Cow::Borrowed(&[][..]), append_cow),
        pair(char('"'), cfws),
    )(i)
}

// RFC 2822 3.2.6 "word"
fn word(i: &[u8]) -> PResult<Cow<[u8]>> {
    alt((map(atom, Cow::Borrowed), quoted_string))(i)
}

// Part of the `obs-phrase` grammar, split out for simplicity. Only CFWS at
// the end is needed since there is always a preceding token allowing CFWS.
fn obs_dot(i: &[u8]) -> PResult<Cow<[u8]>> {
    terminated(map(char('.'), |_| Cow::Borrowed(&b"."[..])), cfws)(i)
}

// RFC 2822 3.2.6 "phrase", plus the "obsolete phrase" syntax which accounts
// for the '.' that many agents put unquoted into display names.
fn phrase(i: &[u8]) -> PResult<Vec<Cow<[u8]>>> {
    map(pair(word, many0(alt((word, obs_dot)))), |(head, mut tail)| {
        tail.insert(0, head);
        tail
    })(i)
}

// RFC 2822 3.4.1 local part of address. `obs-local-part` (`word *("."
// word)`) subsumes the other alternatives, so only that is parsed.
fn local_part(i: &[u8]) -> PResult<Vec<Cow<[u8]>>> {
    separated_list1(char('.'), word)(i)
}

// RFC 2822 4.4 obsolete domain format
fn obs_domain(i: &[u8]) -> PResult<Vec<Cow<[u8]>>> {
    separated_list1(char('.'), map(atom, Cow::Borrowed))(i)
}

// RFC 2822 3.4.1 domain name text, amended by RFC 6532
fn dtext(i: &[u8]) -> PResult<&[u8]> {
    is_not("[]\\ \t\r\n")(i)
}

fn dcontent(i: &[u8]) -> PResult<&[u8]> {
    alt((dtext, quoted_pair, fws))(i)
}

// RFC 2822 3.4.1 domain literal
fn domain_literal(i: &[u8]) -> PResult<Vec<u8>> {
    map(
        delimited(
            pair(cfws, char('[')),
            fold_many0(
                dcontent,
                || vec![b'['],
                |mut acc: Vec<u8>, item: &[u8]| {
                    acc.extend_from_slice(item);
                    acc
                },
            ),
            pair(char(']'), cfws),
        ),
        |mut res| {
            res.push(b']');
            res
        },
    )(i)
}

// RFC 2822 3.4.1 domain; dot-atom is encompassed by obs_domain
fn domain(i: &[u8]) -> PResult<Vec<Cow<[u8]>>> {
    alt((obs_domain, map(domain_literal, |v| vec![Cow::Owned(v)])))(i)
}

// RFC 2822 3.4.1 address specification
fn addr_spec(i: &[u8]) -> PResult<AddrSpec> {
    map(pair(local_part, preceded(char('@'), domain)), |(local, domain)| {
        AddrSpec { local, domain }
    })(i)
}

// RFC 2822 4.4 obsolete routing information, which is discarded
fn obs_route(i: &[u8]) -> PResult<()> {
    map(
        terminated(
            separated_list1(
                many1_count(tuple((cfws, char(','), cfws))),
                preceded(char('@'), domain),
            ),
            char(':'),
        ),
        |_| (),
    )(i)
}

// RFC 2822 3.4 angle-delimited address
fn angle_addr(i: &[u8]) -> PResult<AddrSpec> {
    delimited(
        tuple((cfws, char('<'), opt(obs_route))),
        addr_spec,
        pair(char('>'), cfws),
    )(i)
}

// RFC 2822 3.4 mailbox
fn mailbox(i: &[u8]) -> PResult<MailboxSpec> {
    map(
        alt((pair(opt(phrase), angle_addr), map(addr_spec, |a| (None, a)))),
        |(name, addr)| MailboxSpec {
            name: name.unwrap_or_default(),
            addr,
        },
    )(i)
}

// Used in the obsolete list syntax, which permits empty list elements
fn obs_list_delim(i: &[u8]) -> PResult<()> {
    map(many1_count(tuple((cfws, char(','), cfws))), |_| ())(i)
}

// RFC 2822 3.4 mailbox list, including 4.4 obsolete syntax
fn mailbox_list(i: &[u8]) -> PResult<Vec<MailboxSpec>> {
    delimited(
        opt(obs_list_delim),
        separated_list1(obs_list_delim, mailbox),
        opt(obs_list_delim),
    )(i)
}

// RFC 2822 3.4 group
fn group(i: &[u8]) -> PResult<GroupSpec> {
    map(
        pair(
            terminated(phrase, char(':')),
            terminated(opt(mailbox_list), tuple((cfws, char(';'), cfws))),
        ),
        |(name, boxes)| GroupSpec {
            name,
            boxes: boxes.unwrap_or_default(),
        },
    )(i)
}

// RFC 2822 3.4 address
fn address(i: &[u8]) -> PResult<Address> {
    alt((map(mailbox, Address::Mailbox), map(group, Address::Group)))(i)
}

// RFC 2822 3.4 address list, including 4.4 obsolete syntax
fn address_list(i: &[u8]) -> PResult<Vec<Address>> {
    delimited(
        opt(obs_list_delim),
        separated_list1(obs_list_delim, address),
        opt(obs_list_delim),
    )(i)
}

// RFC 2045 5.1 "token"
fn is_token_char(ch: u8) -> bool {
    ch > b' ' && ch < 0x7f && !b"()<>@,;:\\\"/[]?=".contains(&ch)
}

fn token(i: &[u8]) -> PResult<&[u8]> {
    take_while1(is_token_char)(i)
}

// Unquoted parameter values in the wild regularly contain tspecials (`=` in
// boundaries being the usual offender), so accept anything up to the next
// delimiter.
fn lenient_parm_value(i: &[u8]) -> PResult<&[u8]> {
    is_not(" \t\r\n;\"()")(i)
}

fn parm_value(i: &[u8]) -> PResult<Cow<[u8]>> {
    alt((quoted_string, map(lenient_parm_value, Cow::Borrowed)))(i)
}

// RFC 2045 5.1 "parameter", with its leading semicolon
fn content_type_parm(i: &[u8]) -> PResult<(Cow<[u8]>, Cow<[u8]>)> {
    preceded(
        tuple((cfws, char(';'), cfws)),
        separated_pair(
            map(token, Cow::Borrowed),
            tuple((cfws, char('='), cfws)),
            parm_value,
        ),
    )(i)
}

// RFC 2045 5.1 "content". Anything after the last intelligible parameter
// (e.g. a stray trailing `;`) is ignored.
fn content_type(i: &[u8]) -> PResult<ContentType> {
    map(
        tuple((
            cfws,
            token,
            cfws,
            char('/'),
            cfws,
            token,
            cfws,
            many0(content_type_parm),
        )),
        |(_, typ, _, _, _, subtype, _, parms)| ContentType {
            typ: Cow::Borrowed(typ),
            subtype: Cow::Borrowed(subtype),
            parms,
        },
    )(i)
}

/// Parses an RFC 2822 address list, as found in `To`, `Cc`, `Bcc`, etc.
///
/// The whole value must parse; trailing junk makes the list unparsable.
pub fn parse_address_list(i: &[u8]) -> Option<Vec<Address<'_>>> {
    all_consuming(address_list)(i).ok().map(|(_, list)| list)
}

/// Parses the value of a `Content-Type` header.
pub fn parse_content_type(i: &[u8]) -> Option<ContentType<'_>> {
    content_type(i).ok().map(|(_, ct)| ct)
}

/// Returns `value` with `; name="parm"` appended.
///
/// `parm` must not need escaping within a quoted string.
pub fn append_parm(value: &str, name: &str, parm: &str) -> String {
    let value = value.trim_end().trim_end_matches(';');
    format!("{}; {}=\"{}\"", value, name, parm)
}

/// Splits a single unfolded header line at its colon.
///
/// Returns `None` if there is no colon or the name is not valid UTF-8.
pub fn split_header_line(line: &[u8]) -> Option<(&str, &[u8])> {
    let colon = memchr::memchr(b':', line)?;
    let name = str::from_utf8(&line[..colon]).ok()?.trim();
    if name.is_empty() {
        return None;
    }

    Some((name, &line[colon + 1..]))
}

/// Splits a block of `Name: value` lines into its headers.
///
/// Continuation lines are unfolded. Unintelligible lines are skipped. The
/// block ends at the first blank line, if any.
pub fn split_header_block(block: &[u8]) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in block.split(|&b| b'\n' == b) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            break;
        }

        if line.starts_with(b" ") || line.starts_with(b"\t") {
            if let Some(&mut (_, ref mut value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(String::from_utf8_lossy(line).trim());
            }
            continue;
        }

        if let Some((name, value)) = split_header_line(line) {
            headers.push((
                name.to_owned(),
                String::from_utf8_lossy(value).trim().to_owned(),
            ));
        }
    }

    headers
}
