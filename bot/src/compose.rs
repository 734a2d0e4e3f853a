//! Reply and note text.

use crate::detect::{LinkExtractor, LinkRecord};
use crate::feed::FeedItem;

const ITEM_URL_BASE: &str = "https://stacker.news/items";

const REFERRAL: &str = "YewTuBot";

/// Public link to a feed item, carrying the bot's referral suffix.
pub fn item_url(item_id: &str) -> String {
    format!("{}/{}/r/{}", ITEM_URL_BASE, item_id, REFERRAL)
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Markdown reply listing a mirror link for every detected video.
pub fn reply_text(extractor: &LinkExtractor, links: &[LinkRecord]) -> String {
    let mut lines = vec![format!(
        "🤖 **Privacy-Friendly YouTube Alternative{}**",
        plural(links.len())
    )];

    for link in links {
        lines.push(format!(
            "🔒 Privacy-friendly alternative: {}",
            extractor.to_mirror_url(link)
        ));
    }

    if let Some(first) = links.first() {
        let others = extractor.alternatives(&first.canonical_id);
        if !others.is_empty() {
            lines.push(format!("Other mirrors: {}", others.join(" · ")));
        }
    }

    lines.push(
        "*Powered by [YewTuBot](https://github.com/YewTuBot) - Protecting your privacy, one link at a time* 🛡️"
            .to_string(),
    );

    lines.join("\n\n")
}

/// Nostr note announcing the detection.
pub fn note_text(item: &FeedItem, link_count: usize) -> String {
    format!(
        "🎥 Found {count} YouTube link{s} on Stacker News!\n\n\"{title}\"\n\nPrivacy-friendly alternatives available in the comments 🔒\n\n{url}\n\n#videostr #privacy #stackernews #yewtubot",
        count = link_count,
        s = plural(link_count),
        title = item.title,
        url = item_url(&item.id),
    )
}
