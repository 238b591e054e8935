// Terminal renderer
//
// Turns a DirectiveView into ANSI-styled text for the CLI. Pure string
// building; callers decide where it goes.

use super::markup::{parse_inline, Block, BlockKind, Document, Span, SpanStyle};
use super::view::DirectiveView;
use crate::directive::{Delivery, DirectiveKind, ProtocolPayload};
use crate::draft::{DraftFields, DraftInteractionController, DraftReceipt, DraftState};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const BOLD_ITALIC: &str = "\x1b[1;3m";
const CYAN: &str = "\x1b[36m";
const BOLD_CYAN: &str = "\x1b[1;36m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const GRAY: &str = "\x1b[90m";
const GRAY_DIM: &str = "\x1b[2;90m";

const RULE_WIDTH: usize = 40;

/// ANSI rendering of a view, one line per block
pub fn render(view: &DirectiveView) -> String {
    let mut out = String::new();
    match view {
        DirectiveView::Prose(doc) => push_document(&mut out, doc),
        DirectiveView::Streaming { before } => {
            push_document(&mut out, before);
            out.push_str(&format!("{}⋯ preparing…{}\n", GRAY, RESET));
        }
        DirectiveView::Protocol {
            before,
            protocol,
            after,
        } => {
            push_document(&mut out, before);
            push_protocol(&mut out, protocol);
            push_document(&mut out, after);
        }
        DirectiveView::Draft {
            before,
            controller,
            after,
        } => {
            push_document(&mut out, before);
            push_draft(&mut out, controller);
            push_document(&mut out, after);
        }
        DirectiveView::Receipt {
            before,
            receipt,
            after,
        } => {
            push_document(&mut out, before);
            push_receipt(&mut out, receipt);
            push_document(&mut out, after);
        }
        DirectiveView::Dismissed {
            before,
            kind,
            after,
        } => {
            push_document(&mut out, before);
            let what = match kind {
                DirectiveKind::CalendarDraft => "Calendar event",
                _ => "Email",
            };
            out.push_str(&format!("{}{} cancelled{}\n", GRAY, what, RESET));
            push_document(&mut out, after);
        }
        DirectiveView::ParseError {
            before,
            raw,
            message,
            after,
        } => {
            push_document(&mut out, before);
            out.push_str(&format!(
                "{}Could not read the structured reply: {}{}\n",
                RED, message, RESET
            ));
            for line in raw.lines() {
                out.push_str(&format!("  {}{}{}\n", GRAY_DIM, line, RESET));
            }
            push_document(&mut out, after);
        }
    }
    out
}

fn push_document(out: &mut String, doc: &Document) {
    for block in &doc.blocks {
        push_block(out, block);
    }
}

fn push_block(out: &mut String, block: &Block) {
    let body = if block.reference {
        format!("{}{}{}", GRAY_DIM, block.text(), RESET)
    } else {
        spans(&block.spans)
    };

    let line = match block.kind {
        BlockKind::Blank => String::new(),
        BlockKind::Rule => format!("{}{}{}", GRAY, "─".repeat(RULE_WIDTH), RESET),
        BlockKind::Heading { .. } | BlockKind::Title if !block.reference => {
            format!("{}{}{}", BOLD_CYAN, block.text(), RESET)
        }
        BlockKind::Heading { .. } | BlockKind::Title => body,
        BlockKind::SubHeading => format!("  {}", body),
        BlockKind::Quote => format!("{}│{} {}", GRAY, RESET, body),
        BlockKind::Bullet { depth } => {
            format!("{}• {}", "  ".repeat(depth as usize), body)
        }
        BlockKind::Numbered { number } => format!("{}. {}", number, body),
        BlockKind::Paragraph => body,
    };
    out.push_str(&line);
    out.push('\n');
}

fn spans(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span.style {
            SpanStyle::Plain => span.text.clone(),
            SpanStyle::Bold => format!("{}{}{}", BOLD, span.text, RESET),
            SpanStyle::Italic => format!("{}{}{}", ITALIC, span.text, RESET),
            SpanStyle::BoldItalic => format!("{}{}{}", BOLD_ITALIC, span.text, RESET),
        })
        .collect()
}

fn push_protocol(out: &mut String, protocol: &ProtocolPayload) {
    out.push_str(&format!("{}▌ {}{}\n", BOLD_CYAN, protocol.protocol_name, RESET));
    for step in &protocol.steps {
        let eta = step
            .estimated_time
            .as_deref()
            .map(|t| format!(" {}({}){}", GRAY_DIM, t, RESET))
            .unwrap_or_default();
        out.push_str(&format!("  {}{}.{} {}{}\n", CYAN, step.id, RESET, step.title, eta));
        if !step.description.is_empty() {
            out.push_str(&format!("     {}\n", spans(&parse_inline(&step.description))));
        }
    }
    if let Some(next) = &protocol.next_step_instruction {
        out.push_str(&format!("  {}→ {}{}\n", YELLOW, next, RESET));
    }
}

fn field(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        out.push_str(&format!("  {}{:<9}{} {}\n", GRAY, label, RESET, value));
    }
}

fn push_fields(out: &mut String, fields: &DraftFields) {
    match fields {
        DraftFields::Email(draft) => {
            field(out, "To", &draft.to);
            field(out, "Cc", &draft.cc.join(", "));
            field(out, "Subject", &draft.subject);
            out.push('\n');
            for block in &Document::parse(&draft.body).blocks {
                out.push_str("  ");
                push_block(out, block);
            }
        }
        DraftFields::Calendar(draft) => {
            field(out, "Event", &draft.summary);
            field(out, "Starts", &draft.start_time);
            field(out, "Ends", &draft.end_time);
            field(out, "Guests", &draft.attendees.join(", "));
            field(out, "Details", &spans(&parse_inline(&draft.description)));
        }
    }
}

fn push_draft(out: &mut String, controller: &DraftInteractionController) {
    let title = match controller.kind() {
        DirectiveKind::CalendarDraft => "Calendar event draft",
        _ => "Email draft",
    };
    out.push_str(&format!("{}▌ {}{}\n", BOLD_CYAN, title, RESET));
    push_fields(out, &controller.editable());

    if controller.is_submitting() {
        out.push_str(&format!("  {}sending…{}\n", GRAY, RESET));
    } else if let DraftState::Pending {
        last_error: Some(err),
    } = controller.state()
    {
        out.push_str(&format!("  {}✗ {}{}\n", RED, err, RESET));
    }
}

fn push_delivery(out: &mut String, delivery: &Delivery) {
    if let Some(link) = &delivery.html_link {
        field(out, "Link", link);
    }
    if let Some(status) = &delivery.status {
        field(out, "Status", status);
    }
}

fn push_receipt(out: &mut String, receipt: &DraftReceipt) {
    match receipt {
        DraftReceipt::Email(receipt) => {
            out.push_str(&format!("{}✓ Email sent{}\n", GREEN, RESET));
            field(out, "To", &receipt.draft.to);
            field(out, "Subject", &receipt.draft.subject);
            push_delivery(out, &receipt.delivery);
        }
        DraftReceipt::Calendar(receipt) => {
            out.push_str(&format!("{}✓ Event created{}\n", GREEN, RESET));
            field(out, "Event", &receipt.draft.summary);
            field(out, "Starts", &receipt.draft.start_time);
            push_delivery(out, &receipt.delivery);
        }
    }
}

/// Strip ANSI escapes, for tests and plain output
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}
