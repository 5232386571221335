// Copyright 2026 Fels Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cmp::Ordering;

use crate::model::Candidate;

/// Storage scheme prefixes and the public HTTP endpoint serving them.
const PUBLIC_ENDPOINTS: &[(&str, &str)] = &[("gs://", "http://storage.googleapis.com/")];

/// Lowest cloud cover first, then most recent, then highest address.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.cloud_cover
        .total_cmp(&b.cloud_cover)
        .then_with(|| b.acquired.cmp(&a.acquired))
        .then_with(|| b.address.cmp(&a.address))
}

pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(compare_candidates);
}

/// Rewrites a storage address to its public URL. Unknown schemes pass
/// through unchanged.
pub fn public_address(raw: &str) -> String {
    for (prefix, endpoint) in PUBLIC_ENDPOINTS {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return format!("{endpoint}{rest}");
        }
    }
    raw.to_string()
}

/// Orders candidates and returns their public URLs; `latest` keeps only
/// the first.
pub fn rank(mut candidates: Vec<Candidate>, latest: bool) -> Vec<String> {
    sort_candidates(&mut candidates);
    if latest {
        candidates.truncate(1);
    }
    candidates
        .iter()
        .map(|candidate| public_address(&candidate.address))
        .collect()
}
