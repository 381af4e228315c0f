// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

mod expander_test;
mod geocoding_test;
mod orchestrator_test;
mod result_sink_test;
