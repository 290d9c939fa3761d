//! Service ContentDirectory:1 : Browse, Search et capacités.
//!
//! Le `Result` DIDL-Lite est écrit directement dans la réponse SOAP,
//! échappé au vol : seuls les objets de la page demandée sont rendus.

use dlnaupnp::actions::{ActionError, ActionRequest};
use dlnaupnp::devices::ServiceInfo;
use dlnaupnp::http::HttpReply;
use dlnaupnp::soap::{ActionContext, DispatcherBuilder, reply_action};
use tracing::debug;

use crate::content::{ContentQuery, QueryKind, SearchCriteria, SortCriteria};
use crate::didl::{PropertyFilter, write_didl};
use crate::server::{MediaServer, Properties, respond};

pub const ABBREV: &str = "CDS";
pub const SCPD: &str = include_str!("scpd.xml");

pub fn service() -> ServiceInfo {
    ServiceInfo::new("ContentDirectory", 1, ABBREV)
        .with_path("/CD")
        .with_scpd(SCPD)
}

pub(crate) fn register(builder: DispatcherBuilder, server: &MediaServer) -> DispatcherBuilder {
    let s = server.clone();
    let builder = builder.rule(ABBREV, "Browse", move |req, ctx, reply| {
        browse(&s, req, ctx, reply)
    });
    let s = server.clone();
    let builder = builder.rule(ABBREV, "Search", move |req, ctx, reply| {
        search(&s, req, ctx, reply)
    });
    let s = server.clone();
    let builder = builder.rule(ABBREV, "GetSearchCapabilities", move |req, ctx, reply| {
        let caps = s.provider().search_capabilities().to_string();
        respond(req, ctx, reply, &[("SearchCaps", caps)])
    });
    let s = server.clone();
    let builder = builder.rule(ABBREV, "GetSortCapabilities", move |req, ctx, reply| {
        let caps = s.provider().sort_capabilities().to_string();
        respond(req, ctx, reply, &[("SortCaps", caps)])
    });
    let s = server.clone();
    builder.rule(ABBREV, "GetSystemUpdateID", move |req, ctx, reply| {
        respond(req, ctx, reply, &[("Id", s.system_update_id().to_string())])
    })
}

pub(crate) fn full_state(server: &MediaServer) -> Properties {
    vec![("SystemUpdateID", server.system_update_id().to_string())]
}

/// Fenêtre `StartingIndex` / `RequestedCount` ; un compte nul demande tout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: usize,
    count: Option<usize>,
}

impl Window {
    fn from_request(request: &ActionRequest) -> Result<Self, ActionError> {
        let start = unsigned(request, "StartingIndex")?;
        let count = unsigned(request, "RequestedCount")?;
        Ok(Self {
            start,
            count: (count > 0).then_some(count),
        })
    }
}

fn unsigned(request: &ActionRequest, name: &str) -> Result<usize, ActionError> {
    match request.argument_value(name).map(str::trim) {
        None => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|_| ActionError::InvalidArgs(format!("{} {}", name, value))),
    }
}

fn required<'a>(request: &'a ActionRequest, name: &str) -> Result<&'a str, ActionError> {
    request
        .argument_value(name)
        .map(str::trim)
        .ok_or_else(|| ActionError::InvalidArgs(format!("missing {}", name)))
}

fn sort_criteria(server: &MediaServer, request: &ActionRequest) -> Result<SortCriteria, ActionError> {
    match request.argument_value("SortCriteria") {
        Some(sort) => SortCriteria::parse(sort, server.provider().sort_capabilities()),
        None => Ok(SortCriteria::default()),
    }
}

fn browse(
    server: &MediaServer,
    request: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
) -> Result<(), ActionError> {
    let object_id = required(request, "ObjectID")?;
    let flag = required(request, "BrowseFlag")?;
    let kind = QueryKind::from_browse_flag(flag)
        .ok_or_else(|| ActionError::ArgumentValueInvalid(format!("BrowseFlag {}", flag)))?;
    let query = ContentQuery {
        object_id: object_id.to_string(),
        kind,
        sort: sort_criteria(server, request)?,
    };
    answer(server, request, ctx, reply, &query)
}

fn search(
    server: &MediaServer,
    request: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
) -> Result<(), ActionError> {
    let container_id = required(request, "ContainerID")?;
    let criteria = SearchCriteria::parse(request.argument_value("SearchCriteria").unwrap_or("*"))?;
    check_searchable(&criteria, server.provider().search_capabilities())?;
    let query = ContentQuery {
        object_id: container_id.to_string(),
        kind: QueryKind::Search(criteria),
        sort: sort_criteria(server, request)?,
    };
    answer(server, request, ctx, reply, &query)
}

/// Refuse un critère portant sur une propriété non annoncée.
fn check_searchable(criteria: &SearchCriteria, capabilities: &str) -> Result<(), ActionError> {
    match criteria {
        SearchCriteria::All => Ok(()),
        SearchCriteria::And(a, b) | SearchCriteria::Or(a, b) => {
            check_searchable(a, capabilities)?;
            check_searchable(b, capabilities)
        }
        SearchCriteria::Relation { property, .. } => {
            if capabilities == "*" || capabilities.split(',').any(|cap| cap.trim() == property.as_str()) {
                Ok(())
            } else {
                Err(ActionError::InvalidSearchCriteria(property.clone()))
            }
        }
    }
}

/// Résout la requête puis écrit `Result`, `NumberReturned`, `TotalMatches`
/// et `UpdateID`. Une erreur du provider est levée avant toute écriture.
fn answer(
    server: &MediaServer,
    request: &ActionRequest,
    ctx: &mut ActionContext<'_>,
    reply: &mut dyn HttpReply,
    query: &ContentQuery,
) -> Result<(), ActionError> {
    let window = Window::from_request(request)?;
    let filter = request
        .argument_value("Filter")
        .map(PropertyFilter::parse)
        .unwrap_or_default();
    let page = server.provider().query(query)?;
    let total = page.total_matches;
    let update_id = page.update_id.unwrap_or_else(|| server.system_update_id());
    let items = page.items.skip(window.start);
    let items = items.take(window.count.unwrap_or(usize::MAX));

    let mut returned = 0usize;
    reply_action(
        reply,
        &ctx.service.service_type(),
        request.action(),
        |xp| {
            let counted = items.inspect(|_| returned += 1);
            let mut n = xp.node_with("Result", &[], |xp| {
                xp.escaped(|inner| write_didl(inner, counted, server.base_url(), &filter))
            })?;
            n += xp.argument("NumberReturned", &returned.to_string())?;
            n += xp.argument("TotalMatches", &total.to_string())?;
            n += xp.argument("UpdateID", &update_id.to_string())?;
            Ok(n)
        },
    )?;
    debug!(
        "{} {}: {} of {} from {}",
        request.action(),
        query.object_id,
        returned,
        total,
        window.start
    );
    Ok(())
}
